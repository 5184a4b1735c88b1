use super::*;

impl PostgresGrantStore {
    /// Applies one transition under optimistic concurrency.
    ///
    /// The `WHERE version = $n` guard means a concurrent writer makes the
    /// update match zero rows; the follow-up existence probe tells a
    /// version conflict apart from a missing grant. The status update and
    /// its audit entry commit together or not at all.
    pub(super) async fn transition_grant_impl(
        &self,
        grant_id: GrantId,
        expected_version: i64,
        new_status: GrantStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
        entry: &AuditEntry,
    ) -> AppResult<PermissionGrant> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| store_error("failed to begin grant transition", error))?;

        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            UPDATE permission_grants
            SET
                status = $3,
                version = version + 1,
                revoked_at = CASE WHEN $3 = 'revoked' THEN $4 ELSE revoked_at END,
                revocation_reason = CASE WHEN $3 = 'revoked' THEN $5 ELSE revocation_reason END
            WHERE grant_id = $1
              AND version = $2
            RETURNING
                grant_id, subject, permission_id, scope, status,
                granted_at, granted_by, expires_at, revoked_at,
                revocation_reason, metadata, version
            "#,
        )
        .bind(grant_id.as_uuid())
        .bind(expected_version)
        .bind(new_status.as_str())
        .bind(at)
        .bind(reason)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| store_error("failed to transition grant", error))?;

        let Some(row) = row else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM permission_grants WHERE grant_id = $1)",
            )
            .bind(grant_id.as_uuid())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| store_error("failed to probe grant existence", error))?;

            return Err(if exists {
                AppError::Conflict(format!("grant '{grant_id}' was modified concurrently"))
            } else {
                AppError::NotFound(format!("grant '{grant_id}' does not exist"))
            });
        };

        Self::insert_audit_entry(&mut transaction, entry).await?;
        transaction
            .commit()
            .await
            .map_err(|error| store_error("failed to commit grant transition", error))?;

        row.into_grant()
    }
}
