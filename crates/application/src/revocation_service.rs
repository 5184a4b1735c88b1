use std::sync::Arc;

use grantor_core::{AppError, AppResult, GrantId, NonEmptyString};
use grantor_domain::{GrantStatus, PermissionGrant};

use crate::{Clock, DecisionCache, GrantService, LifecycleEvent, LifecycleEventSink};

/// Result of one expiry sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    /// Grants transitioned to `Expired`.
    pub expired: usize,
    /// Derived grants revoked through cascade.
    pub cascaded: usize,
}

/// Immediate revocation plus the periodic expiry sweep.
///
/// Ordering guarantee: the cache invalidation for a revoked grant's
/// (subject, permission) pair completes before `revoke` returns, so no
/// subsequent check can be satisfied from a stale cached allowance.
#[derive(Clone)]
pub struct RevocationService {
    grants: GrantService,
    cache: Arc<dyn DecisionCache>,
    events: Arc<dyn LifecycleEventSink>,
    clock: Arc<dyn Clock>,
}

impl RevocationService {
    /// Creates a revocation service.
    #[must_use]
    pub fn new(
        grants: GrantService,
        cache: Arc<dyn DecisionCache>,
        events: Arc<dyn LifecycleEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            grants,
            cache,
            events,
            clock,
        }
    }

    /// Revokes a grant and cascades through its delegation links.
    ///
    /// A reason is mandatory; it ends up in the audit trail.
    pub async fn revoke(&self, grant_id: GrantId, reason: &str, actor: &str) -> AppResult<()> {
        let reason = NonEmptyString::new(reason)?;
        let grant = self
            .grants
            .transition(grant_id, GrantStatus::Revoked, actor, Some(reason.as_str()))
            .await?;

        self.invalidate_and_publish_revoked(&grant, Some(reason.as_str().to_owned()))
            .await?;
        self.cascade_revoke(grant_id, actor, "origin grant revoked")
            .await?;

        Ok(())
    }

    /// Transitions expired grants in batch, cascading each one.
    ///
    /// Pending grants past their expiry are swept too, so a consent flow
    /// abandoned between create and activate cannot linger forever.
    pub async fn sweep_expired(&self, limit: usize) -> AppResult<SweepOutcome> {
        let now = self.clock.now();
        let due = self.grants.store().list_expired_grants(now, limit).await?;

        let mut outcome = SweepOutcome::default();
        for grant in due {
            match self
                .grants
                .transition(grant.grant_id(), GrantStatus::Expired, "system.sweeper", None)
                .await
            {
                Ok(expired) => {
                    self.cache
                        .invalidate_subject_permission(expired.subject(), expired.permission_id())
                        .await?;
                    self.events
                        .publish(LifecycleEvent::Expired {
                            grant_id: expired.grant_id(),
                            subject: expired.subject().to_owned(),
                            permission_id: expired.permission_id().clone(),
                        })
                        .await;
                    outcome.expired += 1;
                }
                // Another sweeper or a concurrent revoke got there first.
                Err(AppError::Conflict(_)) => continue,
                Err(error) => return Err(error),
            }

            outcome.cascaded += self
                .cascade_revoke(grant.grant_id(), "system.sweeper", "origin grant expired")
                .await?;
        }

        Ok(outcome)
    }

    /// Revokes every grant reachable through delegation links from
    /// `origin_grant_id`.
    ///
    /// Idempotent: links whose derived grant is already terminal are
    /// skipped, but the walk still descends so an interrupted earlier
    /// cascade is completed. Depth is bounded by the delegation depth
    /// invariant, so the walk terminates.
    async fn cascade_revoke(
        &self,
        origin_grant_id: GrantId,
        actor: &str,
        reason: &str,
    ) -> AppResult<usize> {
        let mut revoked = 0;
        let mut frontier = vec![origin_grant_id];

        while let Some(current) = frontier.pop() {
            let links = self.grants.store().list_delegations_from(current).await?;
            for link in links {
                let derived = self.grants.get_grant(link.derived_grant_id()).await?;
                if !derived.status().is_terminal() {
                    match self
                        .grants
                        .transition(
                            derived.grant_id(),
                            GrantStatus::Revoked,
                            actor,
                            Some(reason),
                        )
                        .await
                    {
                        Ok(updated) => {
                            self.invalidate_and_publish_revoked(
                                &updated,
                                Some(reason.to_owned()),
                            )
                            .await?;
                            revoked += 1;
                        }
                        Err(AppError::Conflict(_)) => {}
                        Err(error) => return Err(error),
                    }
                }
                frontier.push(link.derived_grant_id());
            }
        }

        Ok(revoked)
    }

    async fn invalidate_and_publish_revoked(
        &self,
        grant: &PermissionGrant,
        reason: Option<String>,
    ) -> AppResult<()> {
        self.cache
            .invalidate_subject_permission(grant.subject(), grant.permission_id())
            .await?;
        self.events
            .publish(LifecycleEvent::Revoked {
                grant_id: grant.grant_id(),
                subject: grant.subject().to_owned(),
                permission_id: grant.permission_id().clone(),
                reason,
            })
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
