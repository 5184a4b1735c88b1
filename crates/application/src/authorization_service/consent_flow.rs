use std::collections::BTreeMap;

use grantor_core::{AppError, AppResult};
use grantor_domain::{
    AccessDecision, DenialReason, PermissionMetadata, PermissionRequest,
};
use serde_json::Value;

use super::AuthorizationService;
use crate::{
    ConsentExplanation, ConsentOutcome, CreateGrantInput, DecisionCacheKey, LifecycleEvent,
};

impl AuthorizationService {
    /// Requests interactive consent and finalizes the outcome.
    ///
    /// Approval creates an active grant and a granted cache entry; an
    /// explicit denial is cached under the (shorter) deny TTL. Timeouts and
    /// disconnects resolve fail-closed through the error path and are not
    /// cached, since they say nothing about what a human would have decided.
    pub(super) async fn consent_and_finalize(
        &self,
        request: &PermissionRequest,
        metadata: &PermissionMetadata,
        key: DecisionCacheKey,
    ) -> AppResult<AccessDecision> {
        let explanation = ConsentExplanation {
            display_name: metadata.display_name.clone(),
            description: metadata.description.clone(),
            risk_level: metadata.risk_level,
            justification: request.justification().to_owned(),
        };

        let outcome = self
            .consent
            .request_consent(request, explanation, self.config.consent_timeout)
            .await?;

        match outcome {
            ConsentOutcome::Approved { expires_at } => {
                let mut grant_metadata: BTreeMap<String, Value> = BTreeMap::new();
                grant_metadata.insert(
                    "justification".to_owned(),
                    Value::String(request.justification().to_owned()),
                );

                let grant = self
                    .grants
                    .create_active_grant(CreateGrantInput {
                        subject: request.subject().to_owned(),
                        permission_id: request.permission_id().clone(),
                        scope: request.scope().clone(),
                        granted_by: request.subject().to_owned(),
                        expires_at,
                        metadata: grant_metadata,
                    })
                    .await?;

                let decision = AccessDecision::Granted {
                    grant_id: grant.grant_id(),
                    expires_at: grant.expires_at(),
                };
                self.cache_store(&key, &decision).await;

                self.events
                    .publish(LifecycleEvent::Granted {
                        request_id: request.request_id(),
                        subject: request.subject().to_owned(),
                        permission_id: request.permission_id().clone(),
                        grant_id: grant.grant_id(),
                    })
                    .await;

                Ok(decision)
            }
            ConsentOutcome::Denied => {
                let reason = DenialReason::consent_denied();
                let decision = AccessDecision::Denied {
                    reason: reason.clone(),
                };
                self.cache_store(&key, &decision).await;
                self.record_denial(request, &reason).await;

                Ok(decision)
            }
            ConsentOutcome::TimedOut => Err(AppError::ConsentTimeout(
                self.config.consent_timeout.as_secs(),
            )),
            ConsentOutcome::Disconnected => Err(AppError::ConsentDisconnected),
        }
    }
}
