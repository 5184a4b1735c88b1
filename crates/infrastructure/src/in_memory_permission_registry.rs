use std::collections::HashMap;

use async_trait::async_trait;
use grantor_application::PermissionRegistry;
use grantor_core::AppResult;
use grantor_domain::{PermissionId, PermissionMetadata};
use tokio::sync::RwLock;

/// In-memory permission registry implementation.
///
/// Permissions and implication edges are registered at startup; lookups
/// afterwards are read-only.
#[derive(Debug, Default)]
pub struct InMemoryPermissionRegistry {
    permissions: RwLock<HashMap<PermissionId, PermissionMetadata>>,
    implications: RwLock<HashMap<PermissionId, Vec<PermissionId>>>,
}

impl InMemoryPermissionRegistry {
    /// Creates an empty in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a permission, replacing any previous metadata for its id.
    pub async fn register(&self, metadata: PermissionMetadata) {
        self.permissions
            .write()
            .await
            .insert(metadata.permission_id.clone(), metadata);
    }

    /// Declares that holding `implying` also satisfies `implied`.
    pub async fn register_implication(&self, implied: PermissionId, implying: PermissionId) {
        let mut implications = self.implications.write().await;
        let entries = implications.entry(implied).or_default();
        if !entries.contains(&implying) {
            entries.push(implying);
        }
    }
}

#[async_trait]
impl PermissionRegistry for InMemoryPermissionRegistry {
    async fn lookup(&self, permission_id: &PermissionId) -> AppResult<Option<PermissionMetadata>> {
        Ok(self.permissions.read().await.get(permission_id).cloned())
    }

    async fn implied_by(&self, permission_id: &PermissionId) -> AppResult<Vec<PermissionId>> {
        Ok(self
            .implications
            .read()
            .await
            .get(permission_id)
            .cloned()
            .unwrap_or_default())
    }
}
