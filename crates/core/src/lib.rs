//! Shared primitives for all Grantor crates.

#![forbid(unsafe_code)]

/// Stable identifier newtypes shared across the engine.
pub mod ids;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ids::{DelegationId, GrantId, RequestId};

/// Result type used across Grantor crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Application error categories surfaced by the authorization engine.
///
/// Every variant maps to a fail-closed denial at the pipeline boundary;
/// callers never observe an "unknown" authorization outcome.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested permission is not declared in the registry.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),

    /// Requested scope is malformed or exceeds configured bounds.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with a concurrent mutation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor lacks the authority required for the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Delegated scope exceeds the delegator's own authority.
    #[error("scope exceeded: {0}")]
    ScopeExceeded(String),

    /// Delegation chain depth reached the configured maximum.
    #[error("delegation depth {depth} reached the maximum of {max}")]
    DepthExceeded {
        /// Depth the delegation would have had.
        depth: u32,
        /// Configured maximum chain depth.
        max: u32,
    },

    /// Interactive consent did not resolve before its deadline.
    #[error("consent timed out after {0} seconds")]
    ConsentTimeout(u64),

    /// The consent requester disconnected before resolving.
    #[error("consent requester disconnected")]
    ConsentDisconnected,

    /// The durable grant store could not be reached.
    #[error("grant store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::NonEmptyString;

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn non_empty_string_keeps_value() {
        let value = NonEmptyString::new("user requested");
        assert_eq!(
            value.map(|value| value.as_str().to_owned()).ok(),
            Some("user requested".to_owned())
        );
    }
}
