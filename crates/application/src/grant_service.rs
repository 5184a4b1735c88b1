use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grantor_core::{AppError, AppResult, GrantId};
use grantor_domain::{
    AuditAction, AuditEntry, GrantStatus, PermissionGrant, PermissionId, PermissionScope,
};
use serde_json::Value;

use crate::{Clock, GrantStore};

#[cfg(test)]
mod tests;

/// Retries applied to an optimistically-conflicted transition before the
/// conflict surfaces to the caller.
const TRANSITION_RETRIES: usize = 1;

/// Input payload for creating a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGrantInput {
    /// Subject the grant authorizes.
    pub subject: String,
    /// Granted permission.
    pub permission_id: PermissionId,
    /// Scope limiting where the grant applies.
    pub scope: PermissionScope,
    /// Actor issuing the grant.
    pub granted_by: String,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form metadata copied onto the grant.
    pub metadata: BTreeMap<String, Value>,
}

/// Grant ledger: lifecycle state and persistence facade for grants.
///
/// Every successful status transition appends exactly one audit entry in
/// the same logical operation as the transition itself.
#[derive(Clone)]
pub struct GrantService {
    store: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
}

impl GrantService {
    /// Creates a grant service over a store implementation.
    #[must_use]
    pub fn new(store: Arc<dyn GrantStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates and persists a grant already in `Active` status.
    ///
    /// The grant passes through `Pending` in memory only; it is persisted
    /// once, together with its creation audit entry.
    pub async fn create_active_grant(&self, input: CreateGrantInput) -> AppResult<PermissionGrant> {
        let now = self.clock.now();
        let mut grant = PermissionGrant::new(
            GrantId::new(),
            input.subject,
            input.permission_id,
            input.scope,
            input.granted_by.clone(),
            now,
            input.expires_at,
        );
        for (key, value) in input.metadata {
            grant = grant.with_metadata(key, value);
        }
        grant.apply_transition(GrantStatus::Active, now, None)?;

        let entry = AuditEntry::for_transition(
            grant.grant_id(),
            GrantStatus::Active,
            now,
            input.granted_by,
            AuditAction::GrantCreated,
            None,
        );
        self.store.create_grant(&grant, &entry).await?;

        Ok(grant)
    }

    /// Loads one grant, failing when it does not exist.
    pub async fn get_grant(&self, grant_id: GrantId) -> AppResult<PermissionGrant> {
        self.store
            .get_grant(grant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("grant '{grant_id}' does not exist")))
    }

    /// Lists `Active` grants for a subject and permission.
    pub async fn list_active_grants(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<Vec<PermissionGrant>> {
        self.store.list_active_grants(subject, permission_id).await
    }

    /// Applies one lifecycle transition under optimistic concurrency.
    ///
    /// A conflicting concurrent mutation is retried once against the
    /// re-loaded grant; a second conflict surfaces to the caller.
    pub async fn transition(
        &self,
        grant_id: GrantId,
        new_status: GrantStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> AppResult<PermissionGrant> {
        let mut attempt = 0;
        loop {
            let grant = self.get_grant(grant_id).await?;
            if !grant.status().can_transition_to(new_status) {
                return Err(AppError::Conflict(format!(
                    "grant '{grant_id}' cannot transition from '{}' to '{}'",
                    grant.status().as_str(),
                    new_status.as_str()
                )));
            }

            let now = self.clock.now();
            let entry = AuditEntry::for_transition(
                grant_id,
                new_status,
                now,
                actor,
                Self::action_for(new_status),
                reason.map(str::to_owned),
            );

            match self
                .store
                .transition_grant(grant_id, grant.version(), new_status, now, reason, &entry)
                .await
            {
                Ok(updated) => return Ok(updated),
                Err(AppError::Conflict(message)) => {
                    if attempt >= TRANSITION_RETRIES {
                        return Err(AppError::Conflict(message));
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Returns the audit trail for one grant, oldest first.
    pub async fn audit_trail(&self, grant_id: GrantId) -> AppResult<Vec<AuditEntry>> {
        self.store.audit_trail(grant_id).await
    }

    /// Returns the underlying store port.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    fn action_for(status: GrantStatus) -> AuditAction {
        match status {
            GrantStatus::Revoked => AuditAction::GrantRevoked,
            GrantStatus::Expired => AuditAction::GrantExpired,
            GrantStatus::Pending | GrantStatus::Active | GrantStatus::Superseded => {
                AuditAction::GrantTransitioned
            }
        }
    }
}
