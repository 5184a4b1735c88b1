use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use grantor_application::GrantStore;
use grantor_core::{AppError, AppResult, DelegationId, GrantId};
use grantor_domain::{
    AuditAction, AuditEntry, Delegation, GrantStatus, PermissionGrant, PermissionId,
    PermissionScope,
};

mod audit;
mod delegations;
mod grants;
mod transitions;


/// PostgreSQL-backed grant store.
///
/// Transitions and their audit entries commit in one transaction, with
/// the version column backing optimistic concurrency.
#[derive(Clone)]
pub struct PostgresGrantStore {
    pool: PgPool,
}

impl PostgresGrantStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a database error, keeping connectivity failures distinguishable
/// so the pipeline can deny with an availability reason instead of an
/// opaque internal one.
fn store_error(context: &str, error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            AppError::StoreUnavailable(format!("{context}: {error}"))
        }
        other => AppError::Internal(format!("{context}: {other}")),
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    grant_id: uuid::Uuid,
    subject: String,
    permission_id: String,
    scope: serde_json::Value,
    status: String,
    granted_at: DateTime<Utc>,
    granted_by: String,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revocation_reason: Option<String>,
    metadata: serde_json::Value,
    version: i64,
}

impl GrantRow {
    fn into_grant(self) -> AppResult<PermissionGrant> {
        let permission_id = PermissionId::from_str(&self.permission_id).map_err(|error| {
            AppError::Internal(format!(
                "stored permission id '{}' no longer parses: {error}",
                self.permission_id
            ))
        })?;
        let status = GrantStatus::from_str(&self.status).map_err(|error| {
            AppError::Internal(format!(
                "stored grant status '{}' no longer parses: {error}",
                self.status
            ))
        })?;
        let scope: PermissionScope = serde_json::from_value(self.scope)
            .map_err(|error| AppError::Internal(format!("stored scope no longer parses: {error}")))?;
        let metadata: BTreeMap<String, serde_json::Value> = serde_json::from_value(self.metadata)
            .map_err(|error| {
            AppError::Internal(format!("stored grant metadata no longer parses: {error}"))
        })?;

        Ok(PermissionGrant::restore(
            GrantId::from_uuid(self.grant_id),
            self.subject,
            permission_id,
            scope,
            status,
            self.granted_at,
            self.granted_by,
            self.expires_at,
            self.revoked_at,
            self.revocation_reason,
            metadata,
            self.version,
        ))
    }
}

#[derive(Debug, FromRow)]
struct DelegationRow {
    delegation_id: uuid::Uuid,
    origin_grant_id: uuid::Uuid,
    derived_grant_id: uuid::Uuid,
    delegator: String,
    delegatee: String,
    depth: i32,
    created_at: DateTime<Utc>,
}

impl DelegationRow {
    fn into_delegation(self) -> AppResult<Delegation> {
        let depth = u32::try_from(self.depth).map_err(|error| {
            AppError::Internal(format!(
                "stored delegation depth {} no longer parses: {error}",
                self.depth
            ))
        })?;

        Ok(Delegation::restore(
            DelegationId::from_uuid(self.delegation_id),
            GrantId::from_uuid(self.origin_grant_id),
            GrantId::from_uuid(self.derived_grant_id),
            self.delegator,
            self.delegatee,
            depth,
            self.created_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    entry_id: uuid::Uuid,
    grant_id: Option<uuid::Uuid>,
    new_status: Option<String>,
    recorded_at: DateTime<Utc>,
    actor: String,
    action: String,
    reason: Option<String>,
    details: Option<String>,
}

impl AuditRow {
    fn into_entry(self) -> AppResult<AuditEntry> {
        let action = AuditAction::from_str(&self.action).map_err(|error| {
            AppError::Internal(format!(
                "stored audit action '{}' no longer parses: {error}",
                self.action
            ))
        })?;
        let new_status = self
            .new_status
            .as_deref()
            .map(GrantStatus::from_str)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!("stored audit status no longer parses: {error}"))
            })?;

        Ok(AuditEntry {
            entry_id: self.entry_id,
            grant_id: self.grant_id.map(GrantId::from_uuid),
            new_status,
            recorded_at: self.recorded_at,
            actor: self.actor,
            action,
            reason: self.reason,
            details: self.details,
        })
    }
}

#[async_trait]
impl GrantStore for PostgresGrantStore {
    async fn create_grant(&self, grant: &PermissionGrant, entry: &AuditEntry) -> AppResult<()> {
        self.create_grant_impl(grant, entry).await
    }

    async fn get_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>> {
        self.get_grant_impl(grant_id).await
    }

    async fn list_active_grants(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<Vec<PermissionGrant>> {
        self.list_active_grants_impl(subject, permission_id).await
    }

    async fn list_expired_grants(
        &self,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<PermissionGrant>> {
        self.list_expired_grants_impl(as_of, limit).await
    }

    async fn transition_grant(
        &self,
        grant_id: GrantId,
        expected_version: i64,
        new_status: GrantStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
        entry: &AuditEntry,
    ) -> AppResult<PermissionGrant> {
        self.transition_grant_impl(grant_id, expected_version, new_status, at, reason, entry)
            .await
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> AppResult<()> {
        self.append_audit_entry_impl(entry).await
    }

    async fn audit_trail(&self, grant_id: GrantId) -> AppResult<Vec<AuditEntry>> {
        self.audit_trail_impl(grant_id).await
    }

    async fn create_delegated_grant(
        &self,
        grant: &PermissionGrant,
        delegation: &Delegation,
        entry: &AuditEntry,
    ) -> AppResult<()> {
        self.create_delegated_grant_impl(grant, delegation, entry)
            .await
    }

    async fn list_delegations_from(&self, origin_grant_id: GrantId) -> AppResult<Vec<Delegation>> {
        self.list_delegations_from_impl(origin_grant_id).await
    }

    async fn find_delegation_to(
        &self,
        derived_grant_id: GrantId,
    ) -> AppResult<Option<Delegation>> {
        self.find_delegation_to_impl(derived_grant_id).await
    }
}
