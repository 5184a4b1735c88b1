use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantor_application::GrantStore;
use grantor_core::{AppError, AppResult, GrantId};
use grantor_domain::{AuditEntry, Delegation, GrantStatus, PermissionGrant, PermissionId};
use tokio::sync::RwLock;

/// In-memory grant store implementation.
///
/// Backs tests and single-process deployments. The whole store is guarded
/// by per-collection locks; a transition holds the grant lock while it
/// validates the version, so the optimistic check is race-free here.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    grants: RwLock<HashMap<GrantId, PermissionGrant>>,
    audits: RwLock<Vec<AuditEntry>>,
    delegations: RwLock<Vec<Delegation>>,
}

impl InMemoryGrantStore {
    /// Creates an empty in-memory grant store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn create_grant(&self, grant: &PermissionGrant, entry: &AuditEntry) -> AppResult<()> {
        let mut grants = self.grants.write().await;
        if grants.contains_key(&grant.grant_id()) {
            return Err(AppError::Conflict(format!(
                "grant '{}' already exists",
                grant.grant_id()
            )));
        }

        grants.insert(grant.grant_id(), grant.clone());
        drop(grants);

        self.audits.write().await.push(entry.clone());
        Ok(())
    }

    async fn get_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>> {
        Ok(self.grants.read().await.get(&grant_id).cloned())
    }

    async fn list_active_grants(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<Vec<PermissionGrant>> {
        let grants = self.grants.read().await;

        let mut matching: Vec<PermissionGrant> = grants
            .values()
            .filter(|grant| {
                grant.subject() == subject
                    && grant.permission_id() == permission_id
                    && grant.status() == GrantStatus::Active
            })
            .cloned()
            .collect();
        matching.sort_by_key(PermissionGrant::granted_at);

        Ok(matching)
    }

    async fn list_expired_grants(
        &self,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<PermissionGrant>> {
        let grants = self.grants.read().await;

        let mut due: Vec<PermissionGrant> = grants
            .values()
            .filter(|grant| {
                !grant.status().is_terminal()
                    && grant.expires_at().is_some_and(|expires| expires <= as_of)
            })
            .cloned()
            .collect();
        due.sort_by_key(PermissionGrant::expires_at);
        due.truncate(limit);

        Ok(due)
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
        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&grant_id)
            .ok_or_else(|| AppError::NotFound(format!("grant '{grant_id}' does not exist")))?;

        if grant.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "grant '{grant_id}' was modified concurrently"
            )));
        }

        grant.apply_transition(new_status, at, reason)?;
        let updated = grant.clone();
        drop(grants);

        self.audits.write().await.push(entry.clone());
        Ok(updated)
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> AppResult<()> {
        self.audits.write().await.push(entry.clone());
        Ok(())
    }

    async fn audit_trail(&self, grant_id: GrantId) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .audits
            .read()
            .await
            .iter()
            .filter(|entry| entry.grant_id == Some(grant_id))
            .cloned()
            .collect())
    }

    async fn create_delegated_grant(
        &self,
        grant: &PermissionGrant,
        delegation: &Delegation,
        entry: &AuditEntry,
    ) -> AppResult<()> {
        self.create_grant(grant, entry).await?;
        self.delegations.write().await.push(delegation.clone());
        Ok(())
    }

    async fn list_delegations_from(&self, origin_grant_id: GrantId) -> AppResult<Vec<Delegation>> {
        Ok(self
            .delegations
            .read()
            .await
            .iter()
            .filter(|delegation| delegation.origin_grant_id() == origin_grant_id)
            .cloned()
            .collect())
    }

    async fn find_delegation_to(
        &self,
        derived_grant_id: GrantId,
    ) -> AppResult<Option<Delegation>> {
        Ok(self
            .delegations
            .read()
            .await
            .iter()
            .find(|delegation| delegation.derived_grant_id() == derived_grant_id)
            .cloned())
    }
}
