//! In-memory transactional row store.
//!
//! Every row carries its own write-intent lock. A [`MemoryTransaction`] takes
//! the locks of the rows it reads for update or writes, keeps them until it
//! commits or rolls back, and undoes its writes on rollback (or drop).
//! Writes are applied in place; isolation between writers comes from the row
//! locks alone.

mod executor;
mod table;
mod transaction;

pub use executor::TableMutationExecutor;
pub use table::{MemoryTable, RowId};
pub use transaction::{MemoryTransaction, TransactionState};

use crate::catalog::{QualifiedName, TableDescriptor};
use crate::core::{DbError, Result, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MemoryDatabaseConfig {
    /// How long a transaction waits for a row lock before giving up.
    pub lock_timeout: Duration,
}

impl Default for MemoryDatabaseConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl MemoryDatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

pub(crate) struct DatabaseInner {
    tables: RwLock<HashMap<QualifiedName, MemoryTable>>,
    config: MemoryDatabaseConfig,
    next_transaction_id: AtomicU64,
}

/// Shared handle; clones point at the same tables.
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::with_config(MemoryDatabaseConfig::default())
    }

    pub fn with_config(config: MemoryDatabaseConfig) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                tables: RwLock::new(HashMap::new()),
                config,
                next_transaction_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &MemoryDatabaseConfig {
        &self.inner.config
    }

    pub fn create_table(&self, descriptor: TableDescriptor) -> Result<Arc<TableDescriptor>> {
        descriptor.primary_key_attributes()?;
        let descriptor = Arc::new(descriptor);
        let mut tables = self.inner.tables.write()?;
        let name = descriptor.name().clone();
        if tables.contains_key(&name) {
            return Err(DbError::SchemaConflict(format!(
                "table {} already exists",
                name
            )));
        }
        tables.insert(name, MemoryTable::new(descriptor.clone()));
        Ok(descriptor)
    }

    pub fn descriptor(&self, name: &QualifiedName) -> Result<Arc<TableDescriptor>> {
        self.inner.descriptor(name)
    }

    /// Auto-commit insert.
    pub fn insert(&self, name: &QualifiedName, row: Row) -> Result<RowId> {
        let mut tables = self.inner.tables.write()?;
        tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?
            .insert(row)
    }

    pub fn scan(&self, name: &QualifiedName) -> Result<Vec<Row>> {
        let tables = self.inner.tables.read()?;
        Ok(tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?
            .scan())
    }

    pub fn begin(&self) -> MemoryTransaction {
        let id = self.inner.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        MemoryTransaction::new(id, self.inner.clone())
    }
}

impl DatabaseInner {
    pub(crate) fn descriptor(&self, name: &QualifiedName) -> Result<Arc<TableDescriptor>> {
        let tables = self.tables.read()?;
        tables
            .get(name)
            .map(|table| table.descriptor().clone())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub(crate) fn tables(&self) -> &RwLock<HashMap<QualifiedName, MemoryTable>> {
        &self.tables
    }

    pub(crate) fn lock_timeout(&self) -> Duration {
        self.config.lock_timeout
    }
}
