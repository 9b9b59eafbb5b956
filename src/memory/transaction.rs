use super::DatabaseInner;
use super::table::RowId;
use crate::catalog::QualifiedName;
use crate::core::{DbError, Result, Row, Value};
use crate::hooks::RowLockingTransaction;
use crate::locate::RowCondition;
use crate::query::VerificationQuery;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tokio::time::timeout;
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Reversible write recorded for rollback.
#[derive(Debug, Clone)]
enum Change {
    UpdateRow {
        table: QualifiedName,
        row_id: RowId,
        old_row: Row,
    },
    DeleteRow {
        table: QualifiedName,
        row_id: RowId,
        old_row: Row,
    },
}

type RowKey = (QualifiedName, RowId);

pub struct MemoryTransaction {
    id: u64,
    db: Arc<DatabaseInner>,
    state: TransactionState,
    held_locks: HashMap<RowKey, OwnedMutexGuard<()>>,
    undo_log: Vec<Change>,
}

impl MemoryTransaction {
    pub(crate) fn new(id: u64, db: Arc<DatabaseInner>) -> Self {
        Self {
            id,
            db,
            state: TransactionState::Active,
            held_locks: HashMap::new(),
            undo_log: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub fn held_lock_count(&self) -> usize {
        self.held_locks.len()
    }

    /// Locks the rows of `table` matching `condition` (ascending row id) and
    /// returns their current contents. Rows that vanished or stopped
    /// matching while we waited are left out.
    pub async fn lock_rows(
        &mut self,
        table: &QualifiedName,
        condition: &RowCondition,
    ) -> Result<Vec<(RowId, Row)>> {
        self.ensure_active()?;

        let candidates = {
            let tables = self.db.tables().read()?;
            tables
                .get(table)
                .ok_or_else(|| DbError::TableNotFound(table.to_string()))?
                .matching_locks(condition)?
        };

        let wait = self.db.lock_timeout();
        for (row_id, lock) in &candidates {
            let key = (table.clone(), *row_id);
            if self.held_locks.contains_key(&key) {
                continue;
            }
            let guard = match timeout(wait, lock.clone().lock_owned()).await {
                Ok(guard) => guard,
                Err(_) => {
                    event!(
                        Level::WARN,
                        transaction = self.id,
                        table = %table,
                        row_id = *row_id,
                        "row lock wait timed out"
                    );
                    return Err(DbError::LockTimeout(format!(
                        "row {} of {} not available after {:?}",
                        row_id, table, wait
                    )));
                }
            };
            self.held_locks.insert(key, guard);
        }

        let tables = self.db.tables().read()?;
        let memory_table = tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        let mut locked = Vec::with_capacity(candidates.len());
        for (row_id, _) in &candidates {
            if let Some(row) = memory_table.get(*row_id) {
                if condition.matches(memory_table.descriptor(), row)? {
                    locked.push((*row_id, row.clone()));
                }
            }
        }
        Ok(locked)
    }

    /// Rewrites every locked row matching `condition`; returns the new rows.
    pub async fn update_where<F>(
        &mut self,
        table: &QualifiedName,
        condition: &RowCondition,
        rewrite: F,
    ) -> Result<Vec<Row>>
    where
        F: Fn(&Row) -> Result<Row> + Send,
    {
        let targets = self.lock_rows(table, condition).await?;

        let mut tables = self.db.tables().write()?;
        let memory_table = tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        let mut updated = Vec::with_capacity(targets.len());
        for (row_id, row) in targets {
            let new_row = rewrite(&row)?;
            if let Some(old_row) = memory_table.update(row_id, new_row.clone())? {
                self.undo_log.push(Change::UpdateRow {
                    table: table.clone(),
                    row_id,
                    old_row,
                });
                updated.push(new_row);
            }
        }
        Ok(updated)
    }

    pub async fn delete_where(
        &mut self,
        table: &QualifiedName,
        condition: &RowCondition,
    ) -> Result<usize> {
        let targets = self.lock_rows(table, condition).await?;

        let mut tables = self.db.tables().write()?;
        let memory_table = tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        let mut deleted = 0;
        for (row_id, _) in targets {
            if let Some(old_row) = memory_table.delete(row_id) {
                self.undo_log.push(Change::DeleteRow {
                    table: table.clone(),
                    row_id,
                    old_row,
                });
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Makes the writes permanent and releases every row lock.
    pub fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        {
            let mut tables = self.db.tables().write()?;
            for change in &self.undo_log {
                if let Change::DeleteRow { table, row_id, .. } = change {
                    if let Some(memory_table) = tables.get_mut(table) {
                        memory_table.purge(*row_id);
                    }
                }
            }
        }
        self.undo_log.clear();
        self.state = TransactionState::Committed;
        self.held_locks.clear();
        event!(Level::DEBUG, transaction = self.id, "transaction committed");
        Ok(())
    }

    /// Reverts the writes and releases every row lock.
    pub fn rollback(mut self) -> Result<()> {
        self.ensure_active()?;
        self.undo_all()
    }

    fn undo_all(&mut self) -> Result<()> {
        let result = self.apply_undo_log();
        self.state = TransactionState::RolledBack;
        // Locks go only after the old rows are back
        self.held_locks.clear();
        event!(Level::DEBUG, transaction = self.id, "transaction rolled back");
        result
    }

    fn apply_undo_log(&mut self) -> Result<()> {
        let mut tables = self.db.tables().write()?;
        while let Some(change) = self.undo_log.pop() {
            match change {
                Change::UpdateRow {
                    table,
                    row_id,
                    old_row,
                } => {
                    if let Some(memory_table) = tables.get_mut(&table) {
                        memory_table.update(row_id, old_row)?;
                    }
                }
                Change::DeleteRow {
                    table,
                    row_id,
                    old_row,
                } => {
                    if let Some(memory_table) = tables.get_mut(&table) {
                        memory_table.restore(row_id, old_row);
                    }
                }
            }
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DbError::TransactionClosed(self.id))
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.is_active() {
            if let Err(err) = self.undo_all() {
                event!(
                    Level::WARN,
                    transaction = self.id,
                    error = %err,
                    "rollback on drop failed"
                );
            }
        }
    }
}

#[async_trait]
impl RowLockingTransaction for MemoryTransaction {
    async fn query_locked(&mut self, query: &VerificationQuery) -> Result<Vec<Row>> {
        let descriptor = self.db.descriptor(&query.table)?;
        let version_idx = descriptor
            .find_attribute_index(&query.version_column)
            .ok_or_else(|| {
                DbError::ColumnNotFound(query.version_column.clone(), query.table.to_string())
            })?;

        let locked = self.lock_rows(&query.table, &query.condition).await?;
        locked
            .iter()
            .map(|(_, row)| {
                let stored = row.get(version_idx).unwrap_or(&Value::Null);
                Ok(vec![Value::Boolean(query.version_matches(stored)?)])
            })
            .collect()
    }
}
