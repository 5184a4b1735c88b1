use std::fmt::{Display, Formatter, Write};

use chrono::{DateTime, Utc};
use grantor_core::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::EvaluationContext;

/// Maximum number of constraints a single scope may carry.
///
/// Bounds evaluation cost; scopes are rejected at construction when larger.
pub const MAX_SCOPE_CONSTRAINTS: usize = 50;

/// A single condition limiting where or when a grant applies.
///
/// Closed variant set with one matching rule per variant so that scope
/// evaluation stays total and exhaustively checkable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeConstraint {
    /// Matches when the context's current resource has this id and type.
    Resource {
        /// Resource identifier.
        id: String,
        /// Resource type discriminator (e.g. `file`, `dataset`).
        resource_type: String,
    },
    /// Matches when the context's current project has this id.
    Project {
        /// Project identifier.
        id: String,
    },
    /// Matches when the context's current document has this id.
    Document {
        /// Document identifier.
        id: String,
    },
    /// Matches when the context timestamp falls within [start, end].
    TimeWindow {
        /// Inclusive window start.
        start: DateTime<Utc>,
        /// Inclusive window end.
        end: DateTime<Utc>,
    },
    /// Matches when the context belongs to this session.
    Session {
        /// Session identifier.
        id: String,
    },
}

impl ScopeConstraint {
    /// Evaluates this constraint against a context snapshot.
    ///
    /// A context missing the field a constraint needs evaluates to `false`,
    /// never to an error.
    #[must_use]
    pub fn matches(&self, context: &EvaluationContext) -> bool {
        match self {
            Self::Resource { id, resource_type } => {
                context
                    .current_resource_id()
                    .is_some_and(|current| current == id)
                    && context
                        .current_resource_type()
                        .is_some_and(|current| current == resource_type)
            }
            Self::Project { id } => context
                .current_project_id()
                .is_some_and(|current| current == id),
            Self::Document { id } => context
                .current_document_id()
                .is_some_and(|current| current == id),
            Self::TimeWindow { start, end } => {
                let timestamp = context.timestamp();
                *start <= timestamp && timestamp <= *end
            }
            Self::Session { id } => context.session_id() == id,
        }
    }

    /// Returns whether this constraint is at least as broad as `other`.
    ///
    /// Time windows cover any window nested inside them; every other variant
    /// covers only an identical constraint.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::TimeWindow { start, end },
                Self::TimeWindow {
                    start: other_start,
                    end: other_end,
                },
            ) => start <= other_start && other_end <= end,
            _ => self == other,
        }
    }

    fn write_canonical(&self, output: &mut String) {
        // Stable encoding feeding the scope fingerprint; never reorder.
        match self {
            Self::Resource { id, resource_type } => {
                let _ = write!(output, "resource:{resource_type}:{id};");
            }
            Self::Project { id } => {
                let _ = write!(output, "project:{id};");
            }
            Self::Document { id } => {
                let _ = write!(output, "document:{id};");
            }
            Self::TimeWindow { start, end } => {
                let _ = write!(
                    output,
                    "time_window:{}:{};",
                    start.timestamp_millis(),
                    end.timestamp_millis()
                );
            }
            Self::Session { id } => {
                let _ = write!(output, "session:{id};");
            }
        }
    }
}

/// How a scope combines its constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Every constraint must match.
    AllOf,
    /// At least one constraint must match.
    AnyOf,
}

impl CompositionMode {
    /// Returns a stable storage value for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllOf => "all_of",
            Self::AnyOf => "any_of",
        }
    }
}

/// Stable SHA-256 fingerprint of a scope's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeFingerprint(String);

impl ScopeFingerprint {
    /// Returns the fingerprint as lower-case hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ScopeFingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// An ordered collection of constraints plus a composition mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionScope {
    constraints: Vec<ScopeConstraint>,
    mode: CompositionMode,
}

impl PermissionScope {
    /// Creates a scope, rejecting one with more than
    /// [`MAX_SCOPE_CONSTRAINTS`] constraints.
    pub fn new(
        constraints: Vec<ScopeConstraint>,
        mode: CompositionMode,
    ) -> Result<Self, AppError> {
        if constraints.len() > MAX_SCOPE_CONSTRAINTS {
            return Err(AppError::InvalidScope(format!(
                "scope holds {} constraints, the maximum is {MAX_SCOPE_CONSTRAINTS}",
                constraints.len()
            )));
        }

        if mode == CompositionMode::AnyOf && constraints.is_empty() {
            return Err(AppError::InvalidScope(
                "any-of scope must hold at least one constraint".to_owned(),
            ));
        }

        Ok(Self { constraints, mode })
    }

    /// Creates the unrestricted scope that matches every context.
    #[must_use]
    pub fn global() -> Self {
        Self {
            constraints: Vec::new(),
            mode: CompositionMode::AllOf,
        }
    }

    /// Returns whether this scope carries no constraints at all.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Returns the constraints in declaration order.
    #[must_use]
    pub fn constraints(&self) -> &[ScopeConstraint] {
        &self.constraints
    }

    /// Returns the composition mode.
    #[must_use]
    pub fn mode(&self) -> CompositionMode {
        self.mode
    }

    /// Evaluates this scope against a context snapshot.
    ///
    /// Pure and deterministic: identical (scope, context) pairs always yield
    /// the same boolean. An all-of scope with no constraints matches every
    /// context (the global scope).
    #[must_use]
    pub fn evaluate(&self, context: &EvaluationContext) -> bool {
        match self.mode {
            CompositionMode::AllOf => self
                .constraints
                .iter()
                .all(|constraint| constraint.matches(context)),
            CompositionMode::AnyOf => self
                .constraints
                .iter()
                .any(|constraint| constraint.matches(context)),
        }
    }

    /// Returns whether this scope is equal to or broader than `other`.
    ///
    /// Used to bound delegation: a derived grant's scope must be covered by
    /// the originating grant's scope. The comparison is conservative and
    /// fail-closed; coverage it cannot prove structurally is reported as
    /// not covered.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        if self.is_global() {
            return true;
        }

        match (self.mode, other.mode) {
            // Other is narrower when it re-states every one of our
            // conjuncts (possibly adding more).
            (CompositionMode::AllOf, CompositionMode::AllOf) => self
                .constraints
                .iter()
                .all(|ours| other.constraints.iter().any(|theirs| ours.covers(theirs))),
            // Other's alternatives must all be alternatives we allow.
            (CompositionMode::AnyOf, CompositionMode::AnyOf) => other
                .constraints
                .iter()
                .all(|theirs| self.constraints.iter().any(|ours| ours.covers(theirs))),
            // Any context matching other matches all its conjuncts, so one
            // conjunct inside our alternatives is enough.
            (CompositionMode::AnyOf, CompositionMode::AllOf) => other
                .constraints
                .iter()
                .any(|theirs| self.constraints.iter().any(|ours| ours.covers(theirs))),
            // Each of other's alternatives alone must satisfy every one of
            // our conjuncts.
            (CompositionMode::AllOf, CompositionMode::AnyOf) => {
                !other.constraints.is_empty()
                    && other.constraints.iter().all(|theirs| {
                        self.constraints.iter().all(|ours| ours.covers(theirs))
                    })
            }
        }
    }

    /// Computes the stable fingerprint used as the cache key component.
    #[must_use]
    pub fn fingerprint(&self) -> ScopeFingerprint {
        let mut canonical = String::with_capacity(64);
        let _ = write!(canonical, "{}|", self.mode.as_str());
        for constraint in &self.constraints {
            constraint.write_canonical(&mut canonical);
        }

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();

        let hex = digest
            .iter()
            .fold(String::with_capacity(64), |mut acc, byte| {
                let _ = write!(acc, "{byte:02x}");
                acc
            });

        ScopeFingerprint(hex)
    }
}
