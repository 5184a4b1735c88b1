use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use grantor_core::{AppError, AppResult, GrantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EvaluationContext, PermissionId, PermissionScope};

/// Lifecycle status of a permission grant.
///
/// The lifecycle is `Pending → Active → {Expired | Revoked | Superseded}`.
/// A pending grant may also expire or be revoked directly, covering consent
/// flows abandoned between creation and activation. Terminal states never
/// transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Created but not yet activated by the pipeline.
    Pending,
    /// Satisfies permission checks until expired, revoked, or superseded.
    Active,
    /// Passed its expiry and was swept.
    Expired,
    /// Explicitly withdrawn; never honored again.
    Revoked,
    /// Replaced by a newer grant.
    Superseded,
}

impl GrantStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Superseded => "superseded",
        }
    }

    /// Returns whether the status admits no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Revoked | Self::Superseded)
    }

    /// Returns whether a transition to `next` is part of the lifecycle.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Active | Self::Expired | Self::Revoked),
            Self::Active => matches!(next, Self::Expired | Self::Revoked | Self::Superseded),
            Self::Expired | Self::Revoked | Self::Superseded => false,
        }
    }
}

impl FromStr for GrantStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            "superseded" => Ok(Self::Superseded),
            _ => Err(AppError::Validation(format!(
                "unknown grant status value '{value}'"
            ))),
        }
    }
}

/// A persisted authorization linking a subject, a permission, and a scope.
///
/// Grants are never deleted; lifecycle changes are soft status transitions
/// preserved for audit. The `version` counter backs optimistic concurrency
/// in the grant store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    grant_id: GrantId,
    subject: String,
    permission_id: PermissionId,
    scope: PermissionScope,
    status: GrantStatus,
    granted_at: DateTime<Utc>,
    granted_by: String,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revocation_reason: Option<String>,
    metadata: BTreeMap<String, Value>,
    version: i64,
}

impl PermissionGrant {
    /// Creates a new pending grant.
    #[must_use]
    pub fn new(
        grant_id: GrantId,
        subject: impl Into<String>,
        permission_id: PermissionId,
        scope: PermissionScope,
        granted_by: impl Into<String>,
        granted_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            grant_id,
            subject: subject.into(),
            permission_id,
            scope,
            status: GrantStatus::Pending,
            granted_at,
            granted_by: granted_by.into(),
            expires_at,
            revoked_at: None,
            revocation_reason: None,
            metadata: BTreeMap::new(),
            version: 0,
        }
    }

    /// Restores a grant from its persisted representation.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        grant_id: GrantId,
        subject: String,
        permission_id: PermissionId,
        scope: PermissionScope,
        status: GrantStatus,
        granted_at: DateTime<Utc>,
        granted_by: String,
        expires_at: Option<DateTime<Utc>>,
        revoked_at: Option<DateTime<Utc>>,
        revocation_reason: Option<String>,
        metadata: BTreeMap<String, Value>,
        version: i64,
    ) -> Self {
        Self {
            grant_id,
            subject,
            permission_id,
            scope,
            status,
            granted_at,
            granted_by,
            expires_at,
            revoked_at,
            revocation_reason,
            metadata,
            version,
        }
    }

    /// Applies a lifecycle transition, validating it against the state chart.
    ///
    /// The version counter is bumped so that a concurrent writer holding the
    /// previous version observes a conflict.
    pub fn apply_transition(
        &mut self,
        next: GrantStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "grant '{}' cannot transition from '{}' to '{}'",
                self.grant_id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        if next == GrantStatus::Revoked {
            self.revoked_at = Some(at);
            self.revocation_reason = reason.map(str::to_owned);
        }

        self.status = next;
        self.version += 1;
        Ok(())
    }

    /// Returns whether the grant satisfies checks at the given instant.
    ///
    /// Only `Active`, non-expired grants satisfy checks.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == GrantStatus::Active
            && self.expires_at.is_none_or(|expires_at| now < expires_at)
    }

    /// Returns whether the grant matches the context through its scope.
    #[must_use]
    pub fn satisfies(&self, context: &EvaluationContext) -> bool {
        self.is_active_at(context.timestamp()) && self.scope.evaluate(context)
    }

    /// Attaches a metadata entry, returning the updated grant.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the grant identifier.
    #[must_use]
    pub fn grant_id(&self) -> GrantId {
        self.grant_id
    }

    /// Returns the subject the grant authorizes.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the granted permission id.
    #[must_use]
    pub fn permission_id(&self) -> &PermissionId {
        &self.permission_id
    }

    /// Returns the scope limiting where the grant applies.
    #[must_use]
    pub fn scope(&self) -> &PermissionScope {
        &self.scope
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub fn status(&self) -> GrantStatus {
        self.status
    }

    /// Returns when the grant was created.
    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Returns the actor that issued the grant.
    #[must_use]
    pub fn granted_by(&self) -> &str {
        self.granted_by.as_str()
    }

    /// Returns the expiry, if the grant has one.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns when the grant was revoked, if it was.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns the recorded revocation reason, if any.
    #[must_use]
    pub fn revocation_reason(&self) -> Option<&str> {
        self.revocation_reason.as_deref()
    }

    /// Returns the free-form metadata map.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Returns the optimistic-concurrency version counter.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }
}
