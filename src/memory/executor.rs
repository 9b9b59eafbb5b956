use super::MemoryTransaction;
use crate::catalog::TableDescriptor;
use crate::config::DEFAULT_NODE_ID_FIELD;
use crate::core::{DbError, Result, Value};
use crate::hooks::{HostServices, MutationExecutor, MutationKind, MutationRequest, MutationScope};
use crate::locate::locate_row;
use crate::result::QueryResult;
use async_trait::async_trait;
use chrono::{SubsecRound, Utc};

/// Reference update/delete executor over a [`MemoryTransaction`].
///
/// Locates rows the same way the guard does. Updates apply the request's
/// patch object (client field names) and, when configured, stamp the version
/// column with the current time; deletes remove the located rows.
pub struct TableMutationExecutor {
    services: HostServices,
    node_id_field: String,
    patch_field: String,
    version_column: Option<String>,
}

impl Default for TableMutationExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TableMutationExecutor {
    pub fn new() -> Self {
        Self {
            services: HostServices::default(),
            node_id_field: DEFAULT_NODE_ID_FIELD.to_string(),
            patch_field: "patch".to_string(),
            version_column: None,
        }
    }

    pub fn with_services(mut self, services: HostServices) -> Self {
        self.services = services;
        self
    }

    pub fn node_id_field(mut self, field: &str) -> Self {
        self.node_id_field = field.to_string();
        self
    }

    pub fn patch_field(mut self, field: &str) -> Self {
        self.patch_field = field.to_string();
        self
    }

    /// Column refreshed with `now()` on every update.
    pub fn touch_version_column(mut self, column: &str) -> Self {
        self.version_column = Some(column.to_string());
        self
    }

    fn assignments(
        &self,
        table: &TableDescriptor,
        request: &MutationRequest,
    ) -> Result<Vec<(usize, Value)>> {
        let mut assignments = Vec::new();

        if let Some(patch) = request.field(&self.patch_field) {
            let patch = patch.as_object().ok_or_else(|| {
                DbError::InvalidInput(format!("'{}' must be an object", self.patch_field))
            })?;
            for (field, value) in patch {
                let idx = table
                    .attributes()
                    .iter()
                    .position(|attribute| self.services.inflector.column_field(attribute) == *field)
                    .ok_or_else(|| {
                        DbError::InvalidInput(format!(
                            "unknown field '{}' in patch for {}",
                            field,
                            table.name()
                        ))
                    })?;
                let attribute = &table.attributes()[idx];
                let value = self.services.converter.to_storage(
                    value,
                    &attribute.data_type,
                    attribute.type_modifier,
                )?;
                assignments.push((idx, value));
            }
        }

        if let Some(column) = &self.version_column {
            if let Some(idx) = table.find_attribute_index(column) {
                assignments.retain(|(assigned, _)| *assigned != idx);
                assignments.push((idx, Value::Timestamp(Utc::now().trunc_subsecs(6))));
            }
        }

        Ok(assignments)
    }
}

#[async_trait]
impl MutationExecutor<MemoryTransaction> for TableMutationExecutor {
    async fn execute(
        &self,
        tx: &mut MemoryTransaction,
        scope: &MutationScope,
        request: &MutationRequest,
    ) -> Result<QueryResult> {
        let table = &scope.table;
        let condition = locate_row(table, request, &self.node_id_field, &self.services)?;

        match scope.kind {
            MutationKind::Update => {
                let assignments = self.assignments(table, request)?;
                let rows = tx
                    .update_where(table.name(), &condition, |row| {
                        let mut new_row = row.clone();
                        for (idx, value) in &assignments {
                            new_row[*idx] = value.clone();
                        }
                        Ok(new_row)
                    })
                    .await?;
                let columns = table
                    .attributes()
                    .iter()
                    .map(|attribute| attribute.name.clone())
                    .collect();
                Ok(QueryResult::updated(rows.len()).with_rows(columns, rows))
            }
            MutationKind::Delete => {
                let deleted = tx.delete_where(table.name(), &condition).await?;
                Ok(QueryResult::deleted(deleted))
            }
            MutationKind::Create | MutationKind::Other => Err(DbError::ExecutionError(format!(
                "{:?} mutations are not handled by the table executor",
                scope.kind
            ))),
        }
    }
}
