use super::*;

impl PostgresGrantStore {
    pub(super) async fn create_delegated_grant_impl(
        &self,
        grant: &PermissionGrant,
        delegation: &Delegation,
        entry: &AuditEntry,
    ) -> AppResult<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| store_error("failed to begin delegated grant creation", error))?;

        Self::insert_grant(&mut transaction, grant).await?;

        let depth = i32::try_from(delegation.depth()).map_err(|error| {
            AppError::Internal(format!(
                "delegation depth {} does not encode: {error}",
                delegation.depth()
            ))
        })?;
        sqlx::query(
            r#"
            INSERT INTO grant_delegations (
                delegation_id, origin_grant_id, derived_grant_id,
                delegator, delegatee, depth, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(delegation.delegation_id().as_uuid())
        .bind(delegation.origin_grant_id().as_uuid())
        .bind(delegation.derived_grant_id().as_uuid())
        .bind(delegation.delegator())
        .bind(delegation.delegatee())
        .bind(depth)
        .bind(delegation.created_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| store_error("failed to insert delegation link", error))?;

        Self::insert_audit_entry(&mut transaction, entry).await?;
        transaction
            .commit()
            .await
            .map_err(|error| store_error("failed to commit delegated grant creation", error))
    }

    pub(super) async fn list_delegations_from_impl(
        &self,
        origin_grant_id: GrantId,
    ) -> AppResult<Vec<Delegation>> {
        let rows = sqlx::query_as::<_, DelegationRow>(
            r#"
            SELECT
                delegation_id, origin_grant_id, derived_grant_id,
                delegator, delegatee, depth, created_at
            FROM grant_delegations
            WHERE origin_grant_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(origin_grant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| store_error("failed to list delegations", error))?;

        rows.into_iter().map(DelegationRow::into_delegation).collect()
    }

    pub(super) async fn find_delegation_to_impl(
        &self,
        derived_grant_id: GrantId,
    ) -> AppResult<Option<Delegation>> {
        let row = sqlx::query_as::<_, DelegationRow>(
            r#"
            SELECT
                delegation_id, origin_grant_id, derived_grant_id,
                delegator, delegatee, depth, created_at
            FROM grant_delegations
            WHERE derived_grant_id = $1
            "#,
        )
        .bind(derived_grant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| store_error("failed to find delegation", error))?;

        row.map(DelegationRow::into_delegation).transpose()
    }
}
