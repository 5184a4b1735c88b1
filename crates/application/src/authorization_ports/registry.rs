use async_trait::async_trait;
use grantor_core::AppResult;
use grantor_domain::{PermissionId, PermissionMetadata};

/// Read-only port to the external permission registry.
///
/// The registry owns the static permission catalog and the implication
/// graph. When it is unavailable or a permission is absent, the validate
/// stage denies.
#[async_trait]
pub trait PermissionRegistry: Send + Sync {
    /// Looks up the metadata for one permission.
    async fn lookup(&self, permission_id: &PermissionId) -> AppResult<Option<PermissionMetadata>>;

    /// Lists the permissions whose possession implies `permission_id`.
    async fn implied_by(&self, permission_id: &PermissionId) -> AppResult<Vec<PermissionId>>;
}
