use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use grantor_core::{AppError, GrantId, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PermissionId, PermissionScope};

/// An immutable request for authorization of one capability invocation.
///
/// Created by a caller, never mutated, consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    request_id: RequestId,
    permission_id: PermissionId,
    subject: String,
    session_id: String,
    resource_id: Option<String>,
    scope: PermissionScope,
    requested_at: DateTime<Utc>,
    justification: String,
    context: BTreeMap<String, Value>,
}

impl PermissionRequest {
    /// Creates a request for the given permission and scope.
    #[must_use]
    pub fn new(
        permission_id: PermissionId,
        subject: impl Into<String>,
        session_id: impl Into<String>,
        scope: PermissionScope,
        requested_at: DateTime<Utc>,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            permission_id,
            subject: subject.into(),
            session_id: session_id.into(),
            resource_id: None,
            scope,
            requested_at,
            justification: justification.into(),
            context: BTreeMap::new(),
        }
    }

    /// Attaches the resource the request targets.
    #[must_use]
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Attaches a free-form context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Returns the request identifier.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the requested permission id.
    #[must_use]
    pub fn permission_id(&self) -> &PermissionId {
        &self.permission_id
    }

    /// Returns the requesting subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the session the request originates from.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session_id.as_str()
    }

    /// Returns the resource the request targets, if one was named.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// Returns the requested scope.
    #[must_use]
    pub fn scope(&self) -> &PermissionScope {
        &self.scope
    }

    /// Returns when the request was created.
    #[must_use]
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Returns the caller-supplied justification text.
    #[must_use]
    pub fn justification(&self) -> &str {
        self.justification.as_str()
    }

    /// Returns the free-form context map.
    #[must_use]
    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }
}

/// Stable reason codes carried by denied outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReasonCode {
    /// The permission id is not declared in the registry.
    InvalidPermission,
    /// The requested scope is malformed or out of bounds.
    InvalidScope,
    /// The durable grant store could not be reached.
    StoreUnavailable,
    /// Interactive consent did not resolve before its deadline.
    ConsentTimeout,
    /// The consent requester disconnected.
    ConsentDisconnected,
    /// The subject declined or was declined by consent.
    ConsentDenied,
    /// A concurrent mutation conflicted with the operation.
    ConcurrencyConflict,
    /// A delegation requested more scope than its origin holds.
    ScopeExceeded,
    /// A delegation chain reached its maximum depth.
    DepthExceeded,
    /// The actor lacks the authority for the operation.
    Unauthorized,
    /// Any other internal failure, resolved fail-closed.
    Internal,
}

impl DenialReasonCode {
    /// Returns a stable storage value for this reason code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPermission => "invalid_permission",
            Self::InvalidScope => "invalid_scope",
            Self::StoreUnavailable => "store_unavailable",
            Self::ConsentTimeout => "consent_timeout",
            Self::ConsentDisconnected => "consent_disconnected",
            Self::ConsentDenied => "consent_denied",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::ScopeExceeded => "scope_exceeded",
            Self::DepthExceeded => "depth_exceeded",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        }
    }
}

/// Why a request was denied, in a caller-presentable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialReason {
    /// Stable reason code.
    pub code: DenialReasonCode,
    /// Human-readable explanation; never a raw internal error.
    pub message: String,
}

impl DenialReason {
    /// Creates a denial reason.
    #[must_use]
    pub fn new(code: DenialReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates the denial recorded when consent declines a request.
    #[must_use]
    pub fn consent_denied() -> Self {
        Self::new(DenialReasonCode::ConsentDenied, "consent was not given")
    }
}

impl From<&AppError> for DenialReason {
    /// Maps every error class to a fail-closed denial.
    fn from(error: &AppError) -> Self {
        match error {
            AppError::InvalidPermission(_) => {
                Self::new(DenialReasonCode::InvalidPermission, "invalid permission")
            }
            AppError::InvalidScope(_) | AppError::Validation(_) => {
                Self::new(DenialReasonCode::InvalidScope, "invalid scope")
            }
            AppError::StoreUnavailable(_) => Self::new(
                DenialReasonCode::StoreUnavailable,
                "authorization store is unavailable",
            ),
            AppError::ConsentTimeout(_) => {
                Self::new(DenialReasonCode::ConsentTimeout, "consent timed out")
            }
            AppError::ConsentDisconnected => Self::new(
                DenialReasonCode::ConsentDisconnected,
                "consent requester disconnected",
            ),
            AppError::Conflict(_) => Self::new(
                DenialReasonCode::ConcurrencyConflict,
                "a concurrent change conflicted with the request",
            ),
            AppError::ScopeExceeded(_) => Self::new(
                DenialReasonCode::ScopeExceeded,
                "requested scope exceeds the delegator's authority",
            ),
            AppError::DepthExceeded { .. } => Self::new(
                DenialReasonCode::DepthExceeded,
                "delegation chain is too deep",
            ),
            AppError::Unauthorized(_) => {
                Self::new(DenialReasonCode::Unauthorized, "not authorized")
            }
            AppError::NotFound(_) | AppError::Internal(_) => {
                Self::new(DenialReasonCode::Internal, "authorization failed")
            }
        }
    }
}

/// Terminal outcome of one authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    /// The operation is allowed under the named grant.
    Granted {
        /// Grant that satisfied the request.
        grant_id: GrantId,
        /// Expiry of that grant, if it has one.
        expires_at: Option<DateTime<Utc>>,
    },
    /// The operation is not allowed.
    Denied {
        /// Why the request was denied.
        reason: DenialReason,
    },
    /// The request was routed to human review.
    Escalated {
        /// Reference handed to the review path.
        reference: String,
    },
}

impl AccessDecision {
    /// Returns whether the decision allows the operation.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Response returned by the pipeline for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResponse {
    /// The request this response resolves.
    pub request_id: RequestId,
    /// Terminal decision.
    pub decision: AccessDecision,
}
