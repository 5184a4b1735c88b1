//! Domain entities and invariants for the permission authorization engine.

#![forbid(unsafe_code)]

mod audit;
mod context;
mod delegation;
mod grant;
mod permission;
mod request;
mod scope;

pub use audit::{AuditAction, AuditEntry};
pub use context::EvaluationContext;
pub use delegation::{Delegation, MAX_DELEGATION_DEPTH};
pub use grant::{GrantStatus, PermissionGrant};
pub use permission::{PermissionId, PermissionMetadata, RiskLevel};
pub use request::{
    AccessDecision, AccessResponse, DenialReason, DenialReasonCode, PermissionRequest,
};
pub use scope::{
    CompositionMode, MAX_SCOPE_CONSTRAINTS, PermissionScope, ScopeConstraint, ScopeFingerprint,
};
