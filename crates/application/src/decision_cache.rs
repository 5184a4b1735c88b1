use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantor_core::{AppError, AppResult};
use grantor_domain::{AccessDecision, PermissionId, ScopeFingerprint};
use serde::{Deserialize, Serialize};

/// TTL configuration for the decision cache.
///
/// Granted and denied entries expire independently; the deny TTL is
/// strictly shorter so a denial is always re-examined before an allowance
/// of the same age would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionCacheConfig {
    allow_ttl: Duration,
    deny_ttl: Duration,
}

impl DecisionCacheConfig {
    /// Creates a config, rejecting a deny TTL that is not strictly shorter
    /// than the allow TTL.
    pub fn new(allow_ttl: Duration, deny_ttl: Duration) -> AppResult<Self> {
        if deny_ttl >= allow_ttl {
            return Err(AppError::Validation(
                "deny TTL must be strictly shorter than allow TTL".to_owned(),
            ));
        }

        Ok(Self { allow_ttl, deny_ttl })
    }

    /// Returns the TTL applied to granted entries.
    #[must_use]
    pub fn allow_ttl(&self) -> Duration {
        self.allow_ttl
    }

    /// Returns the TTL applied to denied entries.
    #[must_use]
    pub fn deny_ttl(&self) -> Duration {
        self.deny_ttl
    }

    /// Returns the TTL matching a decision.
    #[must_use]
    pub fn ttl_for(&self, decision: &AccessDecision) -> Duration {
        if decision.is_granted() {
            self.allow_ttl
        } else {
            self.deny_ttl
        }
    }
}

impl Default for DecisionCacheConfig {
    fn default() -> Self {
        Self {
            allow_ttl: Duration::from_secs(300),
            deny_ttl: Duration::from_secs(30),
        }
    }
}

/// Cache key identifying one (subject, permission, scope) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionCacheKey {
    /// Requesting subject.
    pub subject: String,
    /// Requested permission.
    pub permission_id: PermissionId,
    /// Fingerprint of the requested scope.
    pub fingerprint: ScopeFingerprint,
}

impl DecisionCacheKey {
    /// Creates a cache key.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        permission_id: PermissionId,
        fingerprint: ScopeFingerprint,
    ) -> Self {
        Self {
            subject: subject.into(),
            permission_id,
            fingerprint,
        }
    }
}

/// A memoized decision plus its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDecision {
    /// The decision returned verbatim on a hit.
    pub decision: AccessDecision,
    /// Instant past which the entry no longer counts as a hit.
    pub cached_until: DateTime<Utc>,
}

impl CachedDecision {
    /// Returns whether the entry is still fresh at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.cached_until
    }
}

/// Short-TTL memo of recent decisions.
///
/// Entries must never outlive their backing grant: revocation invalidates
/// every fingerprint for the (subject, permission) pair before the revoke
/// call returns.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    /// Returns the cached decision for a key, if present and fresh.
    async fn get(&self, key: &DecisionCacheKey) -> AppResult<Option<CachedDecision>>;

    /// Stores a decision under a key.
    async fn put(&self, key: DecisionCacheKey, decision: CachedDecision) -> AppResult<()>;

    /// Drops every cached fingerprint for a (subject, permission) pair.
    async fn invalidate_subject_permission(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<()>;
}
