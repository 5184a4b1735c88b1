use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use grantor_application::{CachedDecision, Clock, DecisionCache, DecisionCacheKey};
use grantor_core::AppResult;
use grantor_domain::PermissionId;
use tokio::sync::RwLock;

/// In-memory decision cache adapter.
///
/// Entries past their `cached_until` instant are dropped on the read path,
/// so the map does not grow with stale decisions.
pub struct InMemoryDecisionCache {
    entries: RwLock<HashMap<DecisionCacheKey, CachedDecision>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDecisionCache {
    /// Creates an empty in-memory decision cache.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl DecisionCache for InMemoryDecisionCache {
    async fn get(&self, key: &DecisionCacheKey) -> AppResult<Option<CachedDecision>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_fresh_at(now) => return Ok(Some(entry.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_fresh_at(now)) {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn put(&self, key: DecisionCacheKey, decision: CachedDecision) -> AppResult<()> {
        self.entries.write().await.insert(key, decision);
        Ok(())
    }

    async fn invalidate_subject_permission(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<()> {
        self.entries
            .write()
            .await
            .retain(|key, _| !(key.subject == subject && &key.permission_id == permission_id));
        Ok(())
    }
}
