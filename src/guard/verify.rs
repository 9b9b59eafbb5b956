use super::OptimisticLockGuard;
use crate::catalog::{Attribute, TableDescriptor};
use crate::core::{DbError, Result, Row, Value};
use crate::hooks::{
    MutationExecutor, MutationHook, MutationRequest, MutationScope, RowLockingTransaction,
};
use crate::locate::{RowCondition, locate_row};
use crate::query::VerificationQuery;
use crate::result::QueryResult;
use async_trait::async_trait;
use tracing::{Instrument, Level, event, info_span};

#[async_trait]
impl<T> MutationHook<T> for OptimisticLockGuard
where
    T: RowLockingTransaction + ?Sized + 'static,
{
    async fn resolve(
        &self,
        tx: &mut T,
        scope: &MutationScope,
        request: &MutationRequest,
        next: &dyn MutationExecutor<T>,
    ) -> Result<QueryResult> {
        if !scope.is_root_update_or_delete() || scope.table.is_opted_out() {
            return next.execute(tx, scope, request).await;
        }
        let Some(attribute) = self.version_attribute(&scope.table) else {
            event!(
                Level::DEBUG,
                table = %scope.table.name(),
                column = %self.config.version_column,
                "version column absent, passing through"
            );
            return next.execute(tx, scope, request).await;
        };

        let span = info_span!(
            "optimistic_lock.verify",
            table = %scope.table.name(),
            kind = ?scope.kind
        );
        async {
            self.verify(tx, &scope.table, attribute, request).await?;
            event!(Level::DEBUG, "version verified, executing mutation");
            next.execute(tx, scope, request).await
        }
        .instrument(span)
        .await
    }
}

impl OptimisticLockGuard {
    /// Locks the rows `request` targets and checks their version.
    ///
    /// Must run inside the transaction that performs the mutation; the row
    /// locks are held until that transaction ends.
    pub async fn verify<T>(
        &self,
        tx: &mut T,
        table: &TableDescriptor,
        attribute: &Attribute,
        request: &MutationRequest,
    ) -> Result<()>
    where
        T: RowLockingTransaction + ?Sized,
    {
        let query = self.build_query(table, attribute, request)?;
        let rows = tx.query_locked(&query).await?;
        decide(&rows)
    }

    /// The locked read `request` would trigger on `table`, or `None` when the
    /// guard does not apply there.
    pub fn plan(
        &self,
        table: &TableDescriptor,
        request: &MutationRequest,
    ) -> Result<Option<VerificationQuery>> {
        if table.is_opted_out() {
            return Ok(None);
        }
        match self.version_attribute(table) {
            Some(attribute) => self.build_query(table, attribute, request).map(Some),
            None => Ok(None),
        }
    }

    fn build_query(
        &self,
        table: &TableDescriptor,
        attribute: &Attribute,
        request: &MutationRequest,
    ) -> Result<VerificationQuery> {
        let expected = self.expected_version(attribute, request)?;
        let condition = locate_row(table, request, &self.config.node_id_field, &self.services)?;
        Ok(self.verification_query(table, attribute, expected, condition))
    }

    pub fn verification_query(
        &self,
        table: &TableDescriptor,
        attribute: &Attribute,
        expected_version: Value,
        condition: RowCondition,
    ) -> VerificationQuery {
        VerificationQuery {
            table: table.name().clone(),
            version_column: attribute.name.clone(),
            version_type: attribute.data_type.clone(),
            expected_version,
            tolerance: self.config.tolerance_duration(),
            condition,
        }
    }

    fn expected_version(&self, attribute: &Attribute, request: &MutationRequest) -> Result<Value> {
        let field = self.services.inflector.column_field(attribute);
        let supplied = request
            .field(&field)
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                DbError::InvalidInput(format!("missing required version field '{}'", field))
            })?;
        self.services
            .converter
            .to_storage(supplied, &attribute.data_type, attribute.type_modifier)
    }
}

/// Allowed only when at least one row was locked and every locked row's
/// version matched. Zero rows means the row is gone; a NULL comparison
/// counts as a mismatch.
fn decide(rows: &[Row]) -> Result<()> {
    if rows.is_empty() {
        event!(Level::WARN, matched = 0, "mutation blocked: no row locked");
        return Err(DbError::Conflict("no row matched the target".into()));
    }

    let mut stale = 0usize;
    for row in rows {
        match row.first() {
            Some(Value::Boolean(true)) => {}
            // SQL NULL: the comparison did not hold
            Some(Value::Boolean(false)) | Some(Value::Null) => stale += 1,
            _ => {
                return Err(DbError::ExecutionError(
                    "verification row did not carry a boolean".into(),
                ));
            }
        }
    }

    if stale > 0 {
        event!(
            Level::WARN,
            matched = rows.len(),
            stale,
            "mutation blocked: version changed"
        );
        return Err(DbError::Conflict(format!(
            "{} of {} row(s) changed since they were read",
            stale,
            rows.len()
        )));
    }
    Ok(())
}
