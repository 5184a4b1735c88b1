use sqlx::Postgres;

use super::*;

impl PostgresGrantStore {
    pub(super) async fn append_audit_entry_impl(&self, entry: &AuditEntry) -> AppResult<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| store_error("failed to begin audit append", error))?;

        Self::insert_audit_entry(&mut transaction, entry).await?;
        transaction
            .commit()
            .await
            .map_err(|error| store_error("failed to commit audit append", error))
    }

    pub(super) async fn audit_trail_impl(&self, grant_id: GrantId) -> AppResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT
                entry_id, grant_id, new_status, recorded_at,
                actor, action, reason, details
            FROM grant_audit_entries
            WHERE grant_id = $1
            ORDER BY recorded_at, entry_id
            "#,
        )
        .bind(grant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| store_error("failed to load audit trail", error))?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }

    pub(super) async fn insert_audit_entry(
        transaction: &mut sqlx::Transaction<'_, Postgres>,
        entry: &AuditEntry,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO grant_audit_entries (
                entry_id, grant_id, new_status, recorded_at,
                actor, action, reason, details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.grant_id.map(|grant_id| grant_id.as_uuid()))
        .bind(entry.new_status.map(|status| status.as_str()))
        .bind(entry.recorded_at)
        .bind(entry.actor.as_str())
        .bind(entry.action.as_str())
        .bind(entry.reason.as_deref())
        .bind(entry.details.as_deref())
        .execute(&mut **transaction)
        .await
        .map_err(|error| store_error("failed to insert audit entry", error))?;

        Ok(())
    }
}
