use chrono::{DateTime, Utc};
use grantor_core::{DelegationId, GrantId};
use serde::{Deserialize, Serialize};

/// Default maximum depth of a delegation chain.
pub const MAX_DELEGATION_DEPTH: u32 = 3;

/// A link from an originating grant to a grant derived from it.
///
/// Every derived grant has exactly one origin, so delegation links form a
/// forest and cascade revocation is a bounded tree walk with no
/// cycle detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    delegation_id: DelegationId,
    origin_grant_id: GrantId,
    derived_grant_id: GrantId,
    delegator: String,
    delegatee: String,
    depth: u32,
    created_at: DateTime<Utc>,
}

impl Delegation {
    /// Creates a delegation link record.
    #[must_use]
    pub fn new(
        origin_grant_id: GrantId,
        derived_grant_id: GrantId,
        delegator: impl Into<String>,
        delegatee: impl Into<String>,
        depth: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            delegation_id: DelegationId::new(),
            origin_grant_id,
            derived_grant_id,
            delegator: delegator.into(),
            delegatee: delegatee.into(),
            depth,
            created_at,
        }
    }

    /// Restores a delegation from its persisted representation.
    #[must_use]
    pub fn restore(
        delegation_id: DelegationId,
        origin_grant_id: GrantId,
        derived_grant_id: GrantId,
        delegator: String,
        delegatee: String,
        depth: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            delegation_id,
            origin_grant_id,
            derived_grant_id,
            delegator,
            delegatee,
            depth,
            created_at,
        }
    }

    /// Returns the delegation identifier.
    #[must_use]
    pub fn delegation_id(&self) -> DelegationId {
        self.delegation_id
    }

    /// Returns the grant the delegation derives its authority from.
    #[must_use]
    pub fn origin_grant_id(&self) -> GrantId {
        self.origin_grant_id
    }

    /// Returns the grant issued to the delegatee.
    #[must_use]
    pub fn derived_grant_id(&self) -> GrantId {
        self.derived_grant_id
    }

    /// Returns the subject that delegated their authority.
    #[must_use]
    pub fn delegator(&self) -> &str {
        self.delegator.as_str()
    }

    /// Returns the subject the derived grant was issued to.
    #[must_use]
    pub fn delegatee(&self) -> &str {
        self.delegatee.as_str()
    }

    /// Returns the chain depth of the derived grant.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns when the delegation was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
