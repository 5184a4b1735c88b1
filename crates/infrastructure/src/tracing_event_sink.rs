use async_trait::async_trait;
use grantor_application::{LifecycleEvent, LifecycleEventSink};

/// Event sink that emits structured tracing events.
///
/// Publishing never fails and never blocks the pipeline; a dropped log
/// line is the worst case.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Creates a tracing-backed event sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LifecycleEventSink for TracingEventSink {
    async fn publish(&self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::Requested {
                request_id,
                subject,
                permission_id,
            } => {
                tracing::info!(%request_id, %subject, %permission_id, "access requested");
            }
            LifecycleEvent::Granted {
                request_id,
                grant_id,
                subject,
                permission_id,
            } => {
                tracing::info!(%request_id, %grant_id, %subject, %permission_id, "access granted");
            }
            LifecycleEvent::Denied {
                request_id,
                subject,
                permission_id,
                reason_code,
            } => {
                tracing::info!(
                    %request_id,
                    %subject,
                    %permission_id,
                    reason_code = reason_code.as_str(),
                    "access denied"
                );
            }
            LifecycleEvent::Escalated {
                request_id,
                subject,
                permission_id,
            } => {
                tracing::warn!(%request_id, %subject, %permission_id, "access escalated");
            }
            LifecycleEvent::Revoked {
                grant_id,
                subject,
                permission_id,
                reason,
            } => {
                tracing::info!(
                    %grant_id,
                    %subject,
                    %permission_id,
                    reason = reason.as_deref().unwrap_or(""),
                    "grant revoked"
                );
            }
            LifecycleEvent::Expired {
                grant_id,
                subject,
                permission_id,
            } => {
                tracing::info!(%grant_id, %subject, %permission_id, "grant expired");
            }
            LifecycleEvent::Delegated {
                origin_grant_id,
                derived_grant_id,
                delegator,
                delegatee,
                depth,
            } => {
                tracing::info!(
                    %origin_grant_id,
                    %derived_grant_id,
                    %delegator,
                    %delegatee,
                    depth,
                    "grant delegated"
                );
            }
        }
    }
}
