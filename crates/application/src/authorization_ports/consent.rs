use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantor_core::AppResult;
use grantor_domain::{PermissionRequest, RiskLevel};

/// Explanatory payload handed to the external consent dialog.
///
/// Built from registry metadata plus the caller's justification; rendering
/// is the dialog collaborator's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentExplanation {
    /// Human-readable permission name.
    pub display_name: String,
    /// What the permission allows.
    pub description: String,
    /// Registry risk classification.
    pub risk_level: RiskLevel,
    /// Caller-supplied justification text.
    pub justification: String,
}

/// How a pending consent request resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// A human approved the request, optionally bounding the grant's life.
    Approved {
        /// Expiry for the resulting grant, if the approver set one.
        expires_at: Option<DateTime<Utc>>,
    },
    /// A human declined the request.
    Denied,
    /// No decision arrived before the timeout.
    TimedOut,
    /// The requester disconnected while the request was pending.
    Disconnected,
}

/// Port to the external interactive consent collaborator.
///
/// The call suspends until a decision, a disconnect, or the timeout
/// resolves it, whichever comes first. Any non-approval outcome resolves
/// the request to a denial (fail-closed).
#[async_trait]
pub trait ConsentService: Send + Sync {
    /// Requests interactive consent for one pending request.
    async fn request_consent(
        &self,
        request: &PermissionRequest,
        explanation: ConsentExplanation,
        timeout: Duration,
    ) -> AppResult<ConsentOutcome>;
}
