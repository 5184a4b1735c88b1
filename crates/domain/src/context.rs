use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of where and when an authorization check occurs.
///
/// Contexts are the sole basis for scope matching, so they are constructed
/// exclusively by the trusted pipeline and never derived from untrusted
/// client input. All fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    subject: String,
    session_id: String,
    timestamp: DateTime<Utc>,
    current_resource_id: Option<String>,
    current_resource_type: Option<String>,
    current_project_id: Option<String>,
    current_document_id: Option<String>,
}

impl EvaluationContext {
    /// Creates a context snapshot for one check.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session_id: session_id.into(),
            timestamp,
            current_resource_id: None,
            current_resource_type: None,
            current_project_id: None,
            current_document_id: None,
        }
    }

    /// Attaches the resource the subject is currently operating on.
    #[must_use]
    pub fn with_resource(
        mut self,
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        self.current_resource_id = Some(resource_id.into());
        self.current_resource_type = Some(resource_type.into());
        self
    }

    /// Attaches the project the subject is currently operating in.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.current_project_id = Some(project_id.into());
        self
    }

    /// Attaches the document the subject is currently operating on.
    #[must_use]
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.current_document_id = Some(document_id.into());
        self
    }

    /// Returns the subject being checked.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the session the check belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session_id.as_str()
    }

    /// Returns the instant the check is evaluated at.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the current resource id, if one applies.
    #[must_use]
    pub fn current_resource_id(&self) -> Option<&str> {
        self.current_resource_id.as_deref()
    }

    /// Returns the current resource type, if one applies.
    #[must_use]
    pub fn current_resource_type(&self) -> Option<&str> {
        self.current_resource_type.as_deref()
    }

    /// Returns the current project id, if one applies.
    #[must_use]
    pub fn current_project_id(&self) -> Option<&str> {
        self.current_project_id.as_deref()
    }

    /// Returns the current document id, if one applies.
    #[must_use]
    pub fn current_document_id(&self) -> Option<&str> {
        self.current_document_id.as_deref()
    }
}
