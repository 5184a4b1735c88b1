use std::fmt::{Display, Formatter};
use std::str::FromStr;

use grantor_core::AppError;
use serde::{Deserialize, Serialize};

/// Identifier of a permission declared in the external registry.
///
/// Permission ids are lower-case dotted segments such as `file.read` or
/// `network.request.send`. The set of valid ids is owned by the registry;
/// this type only enforces the lexical shape so that malformed ids are
/// rejected before any lookup happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionId(String);

impl PermissionId {
    /// Parses a permission identifier, validating its lexical shape.
    pub fn new(value: impl Into<String>) -> Result<Self, AppError> {
        let value = value.into();
        let well_formed = !value.is_empty()
            && value.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|character| character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_')
            });

        if !well_formed {
            return Err(AppError::InvalidPermission(format!(
                "permission id '{value}' is not a dotted lower-case identifier"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the stable storage value for this permission id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for PermissionId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for PermissionId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionId> for String {
    fn from(value: PermissionId) -> Self {
        value.0
    }
}

impl Display for PermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Risk classification attached to a permission by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Routine operations with no lasting side effects.
    Low,
    /// Operations that mutate user-visible state.
    Medium,
    /// Operations that reach outside the workspace.
    High,
    /// Operations that require human review instead of standard consent.
    Critical,
}

impl RiskLevel {
    /// Returns a stable storage value for this risk level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Registry metadata projection for one permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMetadata {
    /// Permission identifier.
    pub permission_id: PermissionId,
    /// Human-readable name shown in consent explanations.
    pub display_name: String,
    /// Human-readable description of what the permission allows.
    pub description: String,
    /// Risk classification used for escalation routing.
    pub risk_level: RiskLevel,
}

#[cfg(test)]
mod tests {
    use super::{PermissionId, RiskLevel};

    #[test]
    fn permission_id_accepts_dotted_segments() {
        let parsed = PermissionId::new("file.read");
        assert_eq!(
            parsed.map(|id| id.as_str().to_owned()).ok(),
            Some("file.read".to_owned())
        );
    }

    #[test]
    fn permission_id_rejects_empty_segment() {
        assert!(PermissionId::new("file..read").is_err());
        assert!(PermissionId::new(".read").is_err());
        assert!(PermissionId::new("").is_err());
    }

    #[test]
    fn permission_id_rejects_uppercase() {
        assert!(PermissionId::new("File.Read").is_err());
    }

    #[test]
    fn risk_levels_order_by_severity() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }
}
