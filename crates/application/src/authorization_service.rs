use std::sync::Arc;
use std::time::Duration;

use grantor_core::{AppError, AppResult};
use grantor_domain::{
    AccessDecision, AccessResponse, AuditAction, AuditEntry, DenialReason, EvaluationContext,
    PermissionId, PermissionMetadata, PermissionRequest, RiskLevel,
};

use crate::{
    Clock, ConsentService, DecisionCache, DecisionCacheConfig, DecisionCacheKey, GrantService,
    LifecycleEvent, LifecycleEventSink, PermissionRegistry,
};

mod consent_flow;
mod grant_checks;

/// Tunables for the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationConfig {
    /// Upper bound on how long a consent request may stay pending.
    pub consent_timeout: Duration,
    /// Decision cache TTLs.
    pub cache: DecisionCacheConfig,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            consent_timeout: Duration::from_secs(120),
            cache: DecisionCacheConfig::default(),
        }
    }
}

/// Request pipeline: orchestrates validation, cache, grant checks,
/// inheritance, escalation, and consent into one fail-closed decision.
///
/// Stages run in a fixed order; each either resolves the request
/// definitively or passes control to the next. Every internal error maps to
/// a denied outcome at this boundary, so callers never observe an
/// authorization ambiguity.
#[derive(Clone)]
pub struct AuthorizationService {
    registry: Arc<dyn PermissionRegistry>,
    grants: GrantService,
    cache: Arc<dyn DecisionCache>,
    consent: Arc<dyn ConsentService>,
    events: Arc<dyn LifecycleEventSink>,
    clock: Arc<dyn Clock>,
    config: AuthorizationConfig,
}

impl AuthorizationService {
    /// Creates a pipeline over the given collaborator ports.
    #[must_use]
    pub fn new(
        registry: Arc<dyn PermissionRegistry>,
        grants: GrantService,
        cache: Arc<dyn DecisionCache>,
        consent: Arc<dyn ConsentService>,
        events: Arc<dyn LifecycleEventSink>,
        clock: Arc<dyn Clock>,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            registry,
            grants,
            cache,
            consent,
            events,
            clock,
            config,
        }
    }

    /// Processes one request to a terminal decision.
    ///
    /// The context snapshot must be built by the trusted caller, not from
    /// client input: it is the sole basis for scope matching.
    pub async fn authorize(
        &self,
        request: PermissionRequest,
        context: EvaluationContext,
    ) -> AccessResponse {
        let request_id = request.request_id();
        self.events
            .publish(LifecycleEvent::Requested {
                request_id,
                subject: request.subject().to_owned(),
                permission_id: request.permission_id().clone(),
            })
            .await;

        let decision = match self.run_stages(&request, &context).await {
            Ok(decision) => decision,
            Err(error) => self.deny_for_error(&request, &error).await,
        };

        AccessResponse {
            request_id,
            decision,
        }
    }

    /// Returns whether some active grant (direct or via an implying
    /// permission) satisfies the permission in the given context.
    ///
    /// Live check: never consults the decision cache, so it observes a
    /// revocation immediately.
    pub async fn has_permission(
        &self,
        subject: &str,
        permission_id: &PermissionId,
        context: &EvaluationContext,
    ) -> AppResult<bool> {
        if self
            .find_matching_grant(subject, permission_id, context)
            .await?
            .is_some()
        {
            return Ok(true);
        }

        Ok(self
            .find_inherited_grant(subject, permission_id, context)
            .await?
            .is_some())
    }

    async fn run_stages(
        &self,
        request: &PermissionRequest,
        context: &EvaluationContext,
    ) -> AppResult<AccessDecision> {
        // Stage 1: validate against the registry.
        let metadata = self.validate(request).await?;

        // Stage 2: exact-match cache lookup; a hit returns verbatim
        // without touching storage or the consent dialog.
        let key = DecisionCacheKey::new(
            request.subject(),
            request.permission_id().clone(),
            request.scope().fingerprint(),
        );
        if let Some(hit) = self.cache_lookup(&key).await {
            return Ok(hit);
        }

        // Stage 3: existing grants evaluated against the live context.
        if let Some(grant) = self
            .find_matching_grant(request.subject(), request.permission_id(), context)
            .await?
        {
            let decision = AccessDecision::Granted {
                grant_id: grant.grant_id(),
                expires_at: grant.expires_at(),
            };
            self.cache_store(&key, &decision).await;
            return Ok(decision);
        }

        // Stage 4: grants of permissions that imply the requested one.
        // Never cached: the key names the requested permission while the
        // backing grant lives under the implying one, so revoking that
        // grant would leave the entry standing until its TTL.
        if let Some(grant) = self
            .find_inherited_grant(request.subject(), request.permission_id(), context)
            .await?
        {
            return Ok(AccessDecision::Granted {
                grant_id: grant.grant_id(),
                expires_at: grant.expires_at(),
            });
        }

        // Critical-risk permissions go to human review instead of the
        // standard consent dialog.
        if metadata.risk_level == RiskLevel::Critical {
            return self.escalate(request).await;
        }

        // Stages 5 and 6: interactive consent, then finalize.
        self.consent_and_finalize(request, &metadata, key).await
    }

    async fn validate(&self, request: &PermissionRequest) -> AppResult<PermissionMetadata> {
        self.registry
            .lookup(request.permission_id())
            .await?
            .ok_or_else(|| {
                AppError::InvalidPermission(format!(
                    "permission '{}' is not declared in the registry",
                    request.permission_id()
                ))
            })
    }

    async fn cache_lookup(&self, key: &DecisionCacheKey) -> Option<AccessDecision> {
        // A failing cache reads as a miss; the cache is an optimization,
        // not an authority.
        let hit = self.cache.get(key).await.ok().flatten()?;
        if hit.is_fresh_at(self.clock.now()) {
            Some(hit.decision)
        } else {
            None
        }
    }

    async fn cache_store(&self, key: &DecisionCacheKey, decision: &AccessDecision) {
        let ttl = self.config.cache.ttl_for(decision);
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let cached = crate::CachedDecision {
            decision: decision.clone(),
            cached_until: self.clock.now() + ttl,
        };
        // Same reasoning as lookups: a failed write must not change the
        // decision.
        let _ = self.cache.put(key.clone(), cached).await;
    }

    async fn escalate(&self, request: &PermissionRequest) -> AppResult<AccessDecision> {
        let entry = AuditEntry::for_outcome(
            self.clock.now(),
            request.subject(),
            AuditAction::AccessEscalated,
            None,
            Some(format!(
                "critical-risk permission '{}' routed to human review",
                request.permission_id()
            )),
        );
        self.grants.store().append_audit_entry(&entry).await?;

        self.events
            .publish(LifecycleEvent::Escalated {
                request_id: request.request_id(),
                subject: request.subject().to_owned(),
                permission_id: request.permission_id().clone(),
            })
            .await;

        Ok(AccessDecision::Escalated {
            reference: request.request_id().to_string(),
        })
    }

    async fn deny_for_error(
        &self,
        request: &PermissionRequest,
        error: &AppError,
    ) -> AccessDecision {
        let reason = DenialReason::from(error);
        self.record_denial(request, &reason).await;
        AccessDecision::Denied { reason }
    }

    /// Appends the denial audit entry and publishes the denied event.
    ///
    /// Failures here are absorbed: when even the audit store is down the
    /// caller still gets a plain denial, never a raw internal error.
    async fn record_denial(&self, request: &PermissionRequest, reason: &DenialReason) {
        let entry = AuditEntry::for_outcome(
            self.clock.now(),
            request.subject(),
            AuditAction::AccessDenied,
            Some(reason.code.as_str().to_owned()),
            Some(format!(
                "denied '{}' for subject '{}'",
                request.permission_id(),
                request.subject()
            )),
        );
        let _ = self.grants.store().append_audit_entry(&entry).await;

        self.events
            .publish(LifecycleEvent::Denied {
                request_id: request.request_id(),
                subject: request.subject().to_owned(),
                permission_id: request.permission_id().clone(),
                reason_code: reason.code,
            })
            .await;
    }
}
