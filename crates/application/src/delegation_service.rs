use std::sync::Arc;

use chrono::{DateTime, Utc};
use grantor_core::{AppError, AppResult, GrantId};
use grantor_domain::{
    AuditAction, AuditEntry, Delegation, GrantStatus, MAX_DELEGATION_DEPTH, PermissionGrant,
    PermissionId, PermissionScope,
};

use crate::{Clock, GrantService, LifecycleEvent, LifecycleEventSink};

/// Creates derived grants bounded by the delegator's own authority.
///
/// A derived grant never exceeds its origin: its scope must be covered by
/// the origin's scope, its expiry must not outlive the origin's, and the
/// chain depth stays within the configured maximum. Violations fail before
/// any state is created.
#[derive(Clone)]
pub struct DelegationService {
    grants: GrantService,
    events: Arc<dyn LifecycleEventSink>,
    clock: Arc<dyn Clock>,
    max_depth: u32,
}

impl DelegationService {
    /// Creates a delegation service with the default maximum chain depth.
    #[must_use]
    pub fn new(
        grants: GrantService,
        events: Arc<dyn LifecycleEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_max_depth(grants, events, clock, MAX_DELEGATION_DEPTH)
    }

    /// Creates a delegation service with an explicit maximum chain depth.
    #[must_use]
    pub fn with_max_depth(
        grants: GrantService,
        events: Arc<dyn LifecycleEventSink>,
        clock: Arc<dyn Clock>,
        max_depth: u32,
    ) -> Self {
        Self {
            grants,
            events,
            clock,
            max_depth,
        }
    }

    /// Delegates a permission from one subject to another.
    ///
    /// Preconditions are checked in order: the delegator holds an active
    /// grant for the permission (`Unauthorized`), that grant's scope covers
    /// the requested scope (`ScopeExceeded`), the requested expiry does not
    /// outlive the origin's (`ScopeExceeded`), and the chain depth stays
    /// under the maximum (`DepthExceeded`).
    pub async fn delegate(
        &self,
        delegator: &str,
        delegatee: &str,
        permission_id: &PermissionId,
        scope: PermissionScope,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Delegation> {
        let now = self.clock.now();
        let origin = self
            .select_origin_grant(delegator, permission_id, &scope, expires_at, now)
            .await?;

        let depth = self
            .grants
            .store()
            .find_delegation_to(origin.grant_id())
            .await?
            .map_or(0, |link| link.depth());
        if depth >= self.max_depth {
            return Err(AppError::DepthExceeded {
                depth: depth + 1,
                max: self.max_depth,
            });
        }

        let mut derived = PermissionGrant::new(
            GrantId::new(),
            delegatee,
            permission_id.clone(),
            scope,
            delegator,
            now,
            expires_at,
        );
        derived.apply_transition(GrantStatus::Active, now, None)?;

        let delegation = Delegation::new(
            origin.grant_id(),
            derived.grant_id(),
            delegator,
            delegatee,
            depth + 1,
            now,
        );
        let entry = AuditEntry::for_transition(
            derived.grant_id(),
            GrantStatus::Active,
            now,
            delegator,
            AuditAction::GrantDelegated,
            Some(format!("delegated from grant '{}'", origin.grant_id())),
        );
        self.grants
            .store()
            .create_delegated_grant(&derived, &delegation, &entry)
            .await?;

        self.events
            .publish(LifecycleEvent::Delegated {
                origin_grant_id: origin.grant_id(),
                derived_grant_id: derived.grant_id(),
                delegator: delegator.to_owned(),
                delegatee: delegatee.to_owned(),
                depth: delegation.depth(),
            })
            .await;

        Ok(delegation)
    }

    /// Picks the delegator's grant able to back the requested delegation.
    ///
    /// Failures are ranked so the caller sees the most specific violation:
    /// no active grant at all beats reporting a scope problem, and a scope
    /// problem beats reporting an expiry problem.
    async fn select_origin_grant(
        &self,
        delegator: &str,
        permission_id: &PermissionId,
        scope: &PermissionScope,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<PermissionGrant> {
        let candidates: Vec<PermissionGrant> = self
            .grants
            .list_active_grants(delegator, permission_id)
            .await?
            .into_iter()
            .filter(|grant| grant.is_active_at(now))
            .collect();
        if candidates.is_empty() {
            return Err(AppError::Unauthorized(format!(
                "subject '{delegator}' holds no active grant for '{permission_id}'"
            )));
        }

        let covering: Vec<PermissionGrant> = candidates
            .into_iter()
            .filter(|grant| grant.scope().covers(scope))
            .collect();
        if covering.is_empty() {
            return Err(AppError::ScopeExceeded(format!(
                "requested delegation scope exceeds every grant '{delegator}' holds for \
                 '{permission_id}'"
            )));
        }

        covering
            .into_iter()
            .find(|grant| Self::expiry_within_origin(grant.expires_at(), expires_at))
            .ok_or_else(|| {
                AppError::ScopeExceeded(format!(
                    "requested delegation expiry outlives the grant '{delegator}' holds for \
                     '{permission_id}'"
                ))
            })
    }

    /// A derived expiry must be equal to or earlier than the origin's; an
    /// origin without expiry accepts any derived expiry.
    fn expiry_within_origin(
        origin: Option<DateTime<Utc>>,
        requested: Option<DateTime<Utc>>,
    ) -> bool {
        match (origin, requested) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(origin), Some(requested)) => requested <= origin,
        }
    }
}

#[cfg(test)]
mod tests;
