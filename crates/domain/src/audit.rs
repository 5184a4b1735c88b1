use chrono::{DateTime, Utc};
use grantor_core::{AppError, GrantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::GrantStatus;

/// Stable audit actions emitted by the authorization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a request resolves to a denied outcome.
    AccessDenied,
    /// Emitted when a request is escalated to human review.
    AccessEscalated,
    /// Emitted when a grant is created.
    GrantCreated,
    /// Emitted on every grant status transition.
    GrantTransitioned,
    /// Emitted when a grant is revoked.
    GrantRevoked,
    /// Emitted when a grant expires during a sweep.
    GrantExpired,
    /// Emitted when a delegation creates a derived grant.
    GrantDelegated,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "access.denied",
            Self::AccessEscalated => "access.escalated",
            Self::GrantCreated => "grant.created",
            Self::GrantTransitioned => "grant.transitioned",
            Self::GrantRevoked => "grant.revoked",
            Self::GrantExpired => "grant.expired",
            Self::GrantDelegated => "grant.delegated",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "access.denied" => Ok(Self::AccessDenied),
            "access.escalated" => Ok(Self::AccessEscalated),
            "grant.created" => Ok(Self::GrantCreated),
            "grant.transitioned" => Ok(Self::GrantTransitioned),
            "grant.revoked" => Ok(Self::GrantRevoked),
            "grant.expired" => Ok(Self::GrantExpired),
            "grant.delegated" => Ok(Self::GrantDelegated),
            other => Err(AppError::Validation(format!(
                "unknown audit action '{other}'"
            ))),
        }
    }
}

/// Append-only record of one grant status transition or access outcome.
///
/// Audit entries are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Stable entry identifier.
    pub entry_id: Uuid,
    /// Grant the entry refers to, when one exists.
    pub grant_id: Option<GrantId>,
    /// Status the grant moved to, for transition entries.
    pub new_status: Option<GrantStatus>,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Actor that caused the transition or outcome.
    pub actor: String,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Human-readable reason, when one was supplied.
    pub reason: Option<String>,
    /// Optional structured details.
    pub details: Option<String>,
}

impl AuditEntry {
    /// Creates an audit entry for a grant status transition.
    #[must_use]
    pub fn for_transition(
        grant_id: GrantId,
        new_status: GrantStatus,
        recorded_at: DateTime<Utc>,
        actor: impl Into<String>,
        action: AuditAction,
        reason: Option<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            grant_id: Some(grant_id),
            new_status: Some(new_status),
            recorded_at,
            actor: actor.into(),
            action,
            reason,
            details: None,
        }
    }

    /// Creates an audit entry for a pipeline outcome without a grant.
    #[must_use]
    pub fn for_outcome(
        recorded_at: DateTime<Utc>,
        actor: impl Into<String>,
        action: AuditAction,
        reason: Option<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            grant_id: None,
            new_status: None,
            recorded_at,
            actor: actor.into(),
            action,
            reason,
            details,
        }
    }
}
