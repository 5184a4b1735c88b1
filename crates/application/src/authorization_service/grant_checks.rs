use grantor_core::AppResult;
use grantor_domain::{EvaluationContext, PermissionGrant, PermissionId};

use super::AuthorizationService;

impl AuthorizationService {
    /// Finds the first active, non-expired grant for the permission whose
    /// scope evaluates true against the context.
    pub(super) async fn find_matching_grant(
        &self,
        subject: &str,
        permission_id: &PermissionId,
        context: &EvaluationContext,
    ) -> AppResult<Option<PermissionGrant>> {
        let grants = self.grants.list_active_grants(subject, permission_id).await?;
        Ok(grants.into_iter().find(|grant| grant.satisfies(context)))
    }

    /// Repeats the grant lookup for every permission the registry declares
    /// as implying the requested one.
    ///
    /// The implying grant satisfies the request directly; no new grant is
    /// created and no additional scope narrowing is applied. The implying
    /// grant's own scope is evaluated against the same context.
    pub(super) async fn find_inherited_grant(
        &self,
        subject: &str,
        permission_id: &PermissionId,
        context: &EvaluationContext,
    ) -> AppResult<Option<PermissionGrant>> {
        let implying = self.registry.implied_by(permission_id).await?;
        for implying_permission in implying {
            if let Some(grant) = self
                .find_matching_grant(subject, &implying_permission, context)
                .await?
            {
                return Ok(Some(grant));
            }
        }

        Ok(None)
    }
}
