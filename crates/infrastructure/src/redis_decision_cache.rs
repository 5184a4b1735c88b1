use std::sync::Arc;

use async_trait::async_trait;
use grantor_application::{CachedDecision, Clock, DecisionCache, DecisionCacheKey};
use grantor_core::{AppError, AppResult};
use grantor_domain::PermissionId;
use redis::Script;

// Entry keys are tracked in a per-(subject, permission) index set so one
// revocation can drop every fingerprint variant for the pair in a single
// round trip.
const PUT_SCRIPT: &str = r#"
local entry_key = KEYS[1]
local index_key = KEYS[2]
local payload = ARGV[1]
local ttl_ms = tonumber(ARGV[2])

redis.call('SET', entry_key, payload, 'PX', ttl_ms)
redis.call('SADD', index_key, entry_key)

local index_ttl = redis.call('PTTL', index_key)
if index_ttl < ttl_ms then
  redis.call('PEXPIRE', index_key, ttl_ms)
end
return 1
"#;

const INVALIDATE_SCRIPT: &str = r#"
local index_key = KEYS[1]

local entries = redis.call('SMEMBERS', index_key)
for _, entry_key in ipairs(entries) do
  redis.call('DEL', entry_key)
end
redis.call('DEL', index_key)
return #entries
"#;

/// Redis-backed decision cache.
///
/// Entries carry a PX expiry matching their `cached_until` instant, so
/// Redis evicts stale decisions without a sweeper.
#[derive(Clone)]
pub struct RedisDecisionCache {
    client: redis::Client,
    key_prefix: String,
    clock: Arc<dyn Clock>,
}

impl RedisDecisionCache {
    /// Creates a cache with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            clock,
        }
    }

    fn entry_key(&self, key: &DecisionCacheKey) -> String {
        format!(
            "{}:decision:{}:{}:{}",
            self.key_prefix,
            key.subject,
            key.permission_id,
            key.fingerprint.as_str()
        )
    }

    fn index_key(&self, subject: &str, permission_id: &PermissionId) -> String {
        format!("{}:index:{subject}:{permission_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to connect to redis: {error}"))
            })
    }
}

#[async_trait]
impl DecisionCache for RedisDecisionCache {
    async fn get(&self, key: &DecisionCacheKey) -> AppResult<Option<CachedDecision>> {
        let mut connection = self.connection().await?;

        let payload: Option<String> = redis::cmd("GET")
            .arg(self.entry_key(key))
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to read cached decision: {error}"))
            })?;

        payload
            .map(|payload| {
                serde_json::from_str(&payload).map_err(|error| {
                    AppError::Internal(format!("cached decision no longer parses: {error}"))
                })
            })
            .transpose()
    }

    async fn put(&self, key: DecisionCacheKey, decision: CachedDecision) -> AppResult<()> {
        let ttl_ms = (decision.cached_until - self.clock.now()).num_milliseconds();
        if ttl_ms <= 0 {
            return Ok(());
        }

        let payload = serde_json::to_string(&decision).map_err(|error| {
            AppError::Internal(format!("failed to encode cached decision: {error}"))
        })?;
        let mut connection = self.connection().await?;

        let script = Script::new(PUT_SCRIPT);
        let _: i64 = script
            .key(self.entry_key(&key))
            .key(self.index_key(&key.subject, &key.permission_id))
            .arg(payload)
            .arg(ttl_ms)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to store cached decision: {error}"))
            })?;

        Ok(())
    }

    async fn invalidate_subject_permission(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let script = Script::new(INVALIDATE_SCRIPT);
        let _: i64 = script
            .key(self.index_key(subject, permission_id))
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!(
                    "failed to invalidate cached decisions: {error}"
                ))
            })?;

        Ok(())
    }
}
