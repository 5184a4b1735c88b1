use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantor_core::{AppResult, GrantId};
use grantor_domain::{AuditEntry, Delegation, GrantStatus, PermissionGrant, PermissionId};

/// Port to the durable grant store backing the grant ledger.
///
/// Mutating operations that carry an [`AuditEntry`] must persist the record
/// change and the entry in one logical operation: both succeed or both
/// fail. Connectivity failures surface as
/// [`grantor_core::AppError::StoreUnavailable`] so the engine can deny
/// rather than assume a grant.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Persists a new grant together with its creation audit entry.
    async fn create_grant(&self, grant: &PermissionGrant, entry: &AuditEntry) -> AppResult<()>;

    /// Loads one grant by id.
    async fn get_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>>;

    /// Lists grants in `Active` status for a subject and permission.
    ///
    /// Status is the only filter applied here; expiry and scope are
    /// evaluated by the caller against its context.
    async fn list_active_grants(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Lists non-terminal grants whose expiry lies at or before `as_of`.
    async fn list_expired_grants(
        &self,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Applies one status transition under optimistic concurrency.
    ///
    /// The transition only applies while the stored version equals
    /// `expected_version`; otherwise the call fails with
    /// [`grantor_core::AppError::Conflict`] and no state changes. The audit
    /// entry is appended atomically with the transition.
    async fn transition_grant(
        &self,
        grant_id: GrantId,
        expected_version: i64,
        new_status: GrantStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
        entry: &AuditEntry,
    ) -> AppResult<PermissionGrant>;

    /// Appends an audit entry not tied to a grant mutation.
    async fn append_audit_entry(&self, entry: &AuditEntry) -> AppResult<()>;

    /// Returns the audit trail for one grant, oldest first.
    async fn audit_trail(&self, grant_id: GrantId) -> AppResult<Vec<AuditEntry>>;

    /// Persists a derived grant and its delegation link atomically.
    async fn create_delegated_grant(
        &self,
        grant: &PermissionGrant,
        delegation: &Delegation,
        entry: &AuditEntry,
    ) -> AppResult<()>;

    /// Lists delegation links originating from one grant.
    async fn list_delegations_from(&self, origin_grant_id: GrantId) -> AppResult<Vec<Delegation>>;

    /// Finds the delegation link that produced a derived grant, if any.
    async fn find_delegation_to(
        &self,
        derived_grant_id: GrantId,
    ) -> AppResult<Option<Delegation>>;
}
