use async_trait::async_trait;
use grantor_core::{GrantId, RequestId};
use grantor_domain::{DenialReasonCode, PermissionId};
use serde::{Deserialize, Serialize};

/// Lifecycle notification published to external audit/compliance consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A request entered the pipeline.
    Requested {
        /// Request identifier.
        request_id: RequestId,
        /// Requesting subject.
        subject: String,
        /// Requested permission.
        permission_id: PermissionId,
    },
    /// A request resolved to a granted outcome.
    Granted {
        /// Request identifier.
        request_id: RequestId,
        /// Requesting subject.
        subject: String,
        /// Requested permission.
        permission_id: PermissionId,
        /// Grant that satisfied the request.
        grant_id: GrantId,
    },
    /// A request resolved to a denied outcome.
    Denied {
        /// Request identifier.
        request_id: RequestId,
        /// Requesting subject.
        subject: String,
        /// Requested permission.
        permission_id: PermissionId,
        /// Stable denial reason code.
        reason_code: DenialReasonCode,
    },
    /// A request was routed to human review.
    Escalated {
        /// Request identifier.
        request_id: RequestId,
        /// Requesting subject.
        subject: String,
        /// Requested permission.
        permission_id: PermissionId,
    },
    /// A grant was revoked.
    Revoked {
        /// Revoked grant.
        grant_id: GrantId,
        /// Grant subject.
        subject: String,
        /// Granted permission.
        permission_id: PermissionId,
        /// Recorded revocation reason.
        reason: Option<String>,
    },
    /// A grant passed its expiry and was swept.
    Expired {
        /// Expired grant.
        grant_id: GrantId,
        /// Grant subject.
        subject: String,
        /// Granted permission.
        permission_id: PermissionId,
    },
    /// A delegation created a derived grant.
    Delegated {
        /// Originating grant.
        origin_grant_id: GrantId,
        /// Derived grant issued to the delegatee.
        derived_grant_id: GrantId,
        /// Delegating subject.
        delegator: String,
        /// Receiving subject.
        delegatee: String,
        /// Chain depth of the derived grant.
        depth: u32,
    },
}

/// Fire-and-forget sink for lifecycle events.
///
/// Publication is infallible by contract: adapters absorb and report their
/// own delivery failures so a broken sink can never block or reverse an
/// authorization decision.
#[async_trait]
pub trait LifecycleEventSink: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: LifecycleEvent);
}

/// Sink that discards every event, for embedders without consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl LifecycleEventSink for NullEventSink {
    async fn publish(&self, _event: LifecycleEvent) {}
}
