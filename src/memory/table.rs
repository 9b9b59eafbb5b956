use crate::catalog::TableDescriptor;
use crate::core::{DbError, Result, Row, Value};
use crate::locate::RowCondition;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type RowId = u64;

/// Rows of one table plus a write-intent lock per row.
///
/// A deleted row stays behind as a tombstone until the deleting transaction
/// commits, so other writers still find it and queue on its lock.
#[derive(Debug)]
pub struct MemoryTable {
    descriptor: Arc<TableDescriptor>,
    rows: BTreeMap<RowId, Row>,
    tombstones: BTreeMap<RowId, Row>,
    row_locks: HashMap<RowId, Arc<Mutex<()>>>,
    next_row_id: RowId,
}

impl MemoryTable {
    pub fn new(descriptor: Arc<TableDescriptor>) -> Self {
        Self {
            descriptor,
            rows: BTreeMap::new(),
            tombstones: BTreeMap::new(),
            row_locks: HashMap::new(),
            next_row_id: 0,
        }
    }

    pub fn descriptor(&self) -> &Arc<TableDescriptor> {
        &self.descriptor
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        self.validate_row(&row)?;
        self.check_primary_key(&row, None)?;

        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row);
        self.row_locks.insert(id, Arc::new(Mutex::new(())));
        Ok(id)
    }

    /// Puts a row back under its old id (rollback of a delete).
    pub fn restore(&mut self, id: RowId, row: Row) {
        self.tombstones.remove(&id);
        self.rows.insert(id, row);
        self.row_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())));
    }

    pub fn update(&mut self, id: RowId, row: Row) -> Result<Option<Row>> {
        self.validate_row(&row)?;
        self.check_primary_key(&row, Some(id))?;
        Ok(self.rows.get_mut(&id).map(|slot| std::mem::replace(slot, row)))
    }

    /// Hides the row and leaves a tombstone until [`Self::purge`] or
    /// [`Self::restore`].
    pub fn delete(&mut self, id: RowId) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        self.tombstones.insert(id, row.clone());
        Some(row)
    }

    /// Drops the tombstone and lock entry of a row whose delete committed.
    pub fn purge(&mut self, id: RowId) {
        self.tombstones.remove(&id);
        if !self.rows.contains_key(&id) {
            self.row_locks.remove(&id);
        }
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn scan(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }

    /// Ids (ascending) and lock handles of rows matching `condition`,
    /// tombstones included. Callers re-check with [`Self::get`] once locked.
    pub fn matching_locks(&self, condition: &RowCondition) -> Result<Vec<(RowId, Arc<Mutex<()>>)>> {
        let mut matches = Vec::new();
        for (id, row) in self.rows.iter().chain(&self.tombstones) {
            if condition.matches(&self.descriptor, row)? {
                let lock = self.row_locks.get(id).cloned().ok_or_else(|| {
                    DbError::ExecutionError(format!("row {} has no lock entry", id))
                })?;
                matches.push((*id, lock));
            }
        }
        matches.sort_by_key(|(id, _)| *id);
        Ok(matches)
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let attributes = self.descriptor.attributes();
        if row.len() != attributes.len() {
            return Err(DbError::ExecutionError(format!(
                "{} expects {} values, got {}",
                self.descriptor.name(),
                attributes.len(),
                row.len()
            )));
        }

        for (attribute, value) in attributes.iter().zip(row) {
            if value.is_null() {
                if !attribute.nullable {
                    return Err(DbError::ConstraintViolation(format!(
                        "Column '{}' cannot be NULL",
                        attribute.name
                    )));
                }
                continue;
            }
            if !attribute.data_type.is_compatible(value) {
                return Err(DbError::TypeMismatch(format!(
                    "Column '{}' expects type {}, got {}",
                    attribute.name,
                    attribute.data_type,
                    value.type_name()
                )));
            }
        }
        Ok(())
    }

    fn check_primary_key(&self, row: &Row, exclude: Option<RowId>) -> Result<()> {
        let indices: Vec<usize> = self
            .descriptor
            .primary_key_names()
            .iter()
            .filter_map(|column| self.descriptor.find_attribute_index(column))
            .collect();
        if indices.is_empty() {
            return Ok(());
        }

        let key: Vec<&Value> = indices.iter().map(|&idx| &row[idx]).collect();
        let duplicate = self.rows.iter().chain(&self.tombstones).any(|(id, existing)| {
            Some(*id) != exclude
                && indices
                    .iter()
                    .zip(&key)
                    .all(|(&idx, value)| &existing[idx] == *value)
        });
        if duplicate {
            return Err(DbError::ConstraintViolation(format!(
                "duplicate primary key in {}",
                self.descriptor.name()
            )));
        }
        Ok(())
    }
}
