use sqlx::Postgres;

use super::*;

impl PostgresGrantStore {
    pub(super) async fn create_grant_impl(
        &self,
        grant: &PermissionGrant,
        entry: &AuditEntry,
    ) -> AppResult<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| store_error("failed to begin grant creation", error))?;

        Self::insert_grant(&mut transaction, grant).await?;
        Self::insert_audit_entry(&mut transaction, entry).await?;

        transaction
            .commit()
            .await
            .map_err(|error| store_error("failed to commit grant creation", error))
    }

    pub(super) async fn get_grant_impl(
        &self,
        grant_id: GrantId,
    ) -> AppResult<Option<PermissionGrant>> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                grant_id, subject, permission_id, scope, status,
                granted_at, granted_by, expires_at, revoked_at,
                revocation_reason, metadata, version
            FROM permission_grants
            WHERE grant_id = $1
            "#,
        )
        .bind(grant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| store_error("failed to load grant", error))?;

        row.map(GrantRow::into_grant).transpose()
    }

    pub(super) async fn list_active_grants_impl(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<Vec<PermissionGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                grant_id, subject, permission_id, scope, status,
                granted_at, granted_by, expires_at, revoked_at,
                revocation_reason, metadata, version
            FROM permission_grants
            WHERE subject = $1
              AND permission_id = $2
              AND status = 'active'
            ORDER BY granted_at
            "#,
        )
        .bind(subject)
        .bind(permission_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| store_error("failed to list active grants", error))?;

        rows.into_iter().map(GrantRow::into_grant).collect()
    }

    pub(super) async fn list_expired_grants_impl(
        &self,
        at: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> AppResult<Vec<PermissionGrant>> {
        let capped_limit = i64::try_from(limit.min(10_000)).unwrap_or(10_000);
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                grant_id, subject, permission_id, scope, status,
                granted_at, granted_by, expires_at, revoked_at,
                revocation_reason, metadata, version
            FROM permission_grants
            WHERE status IN ('pending', 'active')
              AND expires_at IS NOT NULL
              AND expires_at <= $1
            ORDER BY expires_at
            LIMIT $2
            "#,
        )
        .bind(at)
        .bind(capped_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| store_error("failed to list expired grants", error))?;

        rows.into_iter().map(GrantRow::into_grant).collect()
    }

    pub(super) async fn insert_grant(
        transaction: &mut sqlx::Transaction<'_, Postgres>,
        grant: &PermissionGrant,
    ) -> AppResult<()> {
        let scope = serde_json::to_value(grant.scope()).map_err(|error| {
            AppError::Internal(format!("failed to encode grant scope: {error}"))
        })?;
        let metadata = serde_json::to_value(grant.metadata()).map_err(|error| {
            AppError::Internal(format!("failed to encode grant metadata: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO permission_grants (
                grant_id, subject, permission_id, scope, status,
                granted_at, granted_by, expires_at, revoked_at,
                revocation_reason, metadata, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(grant.grant_id().as_uuid())
        .bind(grant.subject())
        .bind(grant.permission_id().as_str())
        .bind(scope)
        .bind(grant.status().as_str())
        .bind(grant.granted_at())
        .bind(grant.granted_by())
        .bind(grant.expires_at())
        .bind(grant.revoked_at())
        .bind(grant.revocation_reason())
        .bind(metadata)
        .bind(grant.version())
        .execute(&mut **transaction)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "grant '{}' already exists",
                grant.grant_id()
            )),
            other => store_error("failed to insert grant", other),
        })?;

        Ok(())
    }
}
