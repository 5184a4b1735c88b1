use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grantor_application::{ConsentExplanation, ConsentOutcome, ConsentService};
use grantor_core::{AppResult, RequestId};
use grantor_domain::{PermissionId, PermissionRequest};
use tokio::sync::{Mutex, mpsc, oneshot};

/// Prompt delivered to whatever renders the consent dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentPrompt {
    /// Request awaiting a decision.
    pub request_id: RequestId,
    /// Subject asking for access.
    pub subject: String,
    /// Permission being requested.
    pub permission_id: PermissionId,
    /// Explanation to show the approver.
    pub explanation: ConsentExplanation,
}

/// Channel-backed consent service.
///
/// `request_consent` parks the caller on a oneshot until `resolve` or
/// `disconnect` delivers an outcome, or the timeout elapses. Prompts go
/// out over an mpsc channel so the dialog renderer stays decoupled from
/// the authorization pipeline.
pub struct ChannelConsentService {
    prompts: mpsc::Sender<ConsentPrompt>,
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ConsentOutcome>>>>,
}

impl ChannelConsentService {
    /// Creates a consent service publishing prompts to `prompts`.
    #[must_use]
    pub fn new(prompts: mpsc::Sender<ConsentPrompt>) -> Self {
        Self {
            prompts,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delivers a decision for a pending request.
    ///
    /// Returns `false` when no request with this id is waiting, which
    /// happens after a timeout or a duplicate resolution.
    pub async fn resolve(&self, request_id: RequestId, outcome: ConsentOutcome) -> bool {
        let sender = self.pending.lock().await.remove(&request_id);
        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Resolves a pending request as disconnected.
    pub async fn disconnect(&self, request_id: RequestId) -> bool {
        self.resolve(request_id, ConsentOutcome::Disconnected).await
    }

    async fn park(&self, request_id: RequestId) -> oneshot::Receiver<ConsentOutcome> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(request_id, sender);
        receiver
    }

    async fn unpark(&self, request_id: RequestId) {
        self.pending.lock().await.remove(&request_id);
    }
}

#[async_trait]
impl ConsentService for ChannelConsentService {
    async fn request_consent(
        &self,
        request: &PermissionRequest,
        explanation: ConsentExplanation,
        timeout: Duration,
    ) -> AppResult<ConsentOutcome> {
        let request_id = request.request_id();
        let receiver = self.park(request_id).await;

        let prompt = ConsentPrompt {
            request_id,
            subject: request.subject().to_owned(),
            permission_id: request.permission_id().clone(),
            explanation,
        };
        if self.prompts.send(prompt).await.is_err() {
            // No dialog renderer is attached; nobody can ever approve.
            self.unpark(request_id).await;
            return Ok(ConsentOutcome::Disconnected);
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Ok(ConsentOutcome::Disconnected),
            Err(_) => {
                self.unpark(request_id).await;
                Ok(ConsentOutcome::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use grantor_domain::{PermissionScope, RiskLevel};

    use super::*;

    fn request() -> PermissionRequest {
        PermissionRequest::new(
            PermissionId::new("file.read").unwrap_or_else(|_| unreachable!("valid id")),
            "alice",
            "session-1",
            PermissionScope::global(),
            Utc::now(),
            "needs the file",
        )
    }

    fn explanation() -> ConsentExplanation {
        ConsentExplanation {
            display_name: "Read files".to_owned(),
            description: "Read file contents".to_owned(),
            risk_level: RiskLevel::Low,
            justification: "needs the file".to_owned(),
        }
    }

    #[tokio::test]
    async fn delivers_the_resolved_outcome() {
        let (prompts, mut prompt_rx) = mpsc::channel(4);
        let service = Arc::new(ChannelConsentService::new(prompts));
        let request = request();

        let waiting = {
            let service = service.clone();
            let request = request.clone();
            tokio::spawn(async move {
                service
                    .request_consent(&request, explanation(), Duration::from_secs(5))
                    .await
            })
        };

        let prompt = prompt_rx.recv().await;
        let prompt = prompt.unwrap_or_else(|| unreachable!("prompt expected"));
        assert_eq!(prompt.subject, "alice");

        let delivered = service
            .resolve(prompt.request_id, ConsentOutcome::Approved { expires_at: None })
            .await;
        assert!(delivered);

        let outcome = waiting.await;
        assert!(matches!(
            outcome,
            Ok(Ok(ConsentOutcome::Approved { expires_at: None }))
        ));
    }

    #[tokio::test]
    async fn times_out_when_nobody_answers() {
        let (prompts, mut prompt_rx) = mpsc::channel(4);
        let service = ChannelConsentService::new(prompts);
        let request = request();

        let outcome = service
            .request_consent(&request, explanation(), Duration::from_millis(20))
            .await;
        assert!(matches!(outcome, Ok(ConsentOutcome::TimedOut)));
        assert!(prompt_rx.recv().await.is_some());

        // The slot is gone; a late answer is reported as undeliverable.
        let late = service
            .resolve(request.request_id(), ConsentOutcome::Denied)
            .await;
        assert!(!late);
    }

    #[tokio::test]
    async fn resolves_as_disconnected_without_a_renderer() {
        let (prompts, prompt_rx) = mpsc::channel(4);
        drop(prompt_rx);
        let service = ChannelConsentService::new(prompts);

        let outcome = service
            .request_consent(&request(), explanation(), Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, Ok(ConsentOutcome::Disconnected)));
    }
}
