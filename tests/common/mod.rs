#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rowguard::{
    Attribute, DataType, DbError, HookRegistry, MemoryDatabase, MemoryDatabaseConfig,
    MemoryTransaction, MutationExecutor, MutationRequest, MutationScope, OptimisticLockGuard,
    QueryResult, Result, Row, RowLockingTransaction, TableDescriptor, TableMutationExecutor,
    Value, VerificationQuery,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const V1: &str = "2024-03-01T12:00:00.000000Z";
pub const V2: &str = "2024-03-02T08:30:00.250000Z";

pub fn ts(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
}

pub fn posts_table() -> TableDescriptor {
    TableDescriptor::new("app", "posts")
        .attribute(Attribute::new("id", DataType::Integer).not_null())
        .attribute(Attribute::new("title", DataType::Text))
        .attribute(Attribute::new("updated_at", DataType::Timestamp).not_null())
        .primary_key(&["id"])
}

/// Posts 1 and 2 at version V1, post 3 at V2.
pub fn seeded_db() -> (MemoryDatabase, Arc<TableDescriptor>) {
    seeded_db_with(MemoryDatabaseConfig::default())
}

pub fn seeded_db_with(config: MemoryDatabaseConfig) -> (MemoryDatabase, Arc<TableDescriptor>) {
    let db = MemoryDatabase::with_config(config);
    let table = db.create_table(posts_table()).unwrap();
    for (id, title, version) in [(1, "first", V1), (2, "second", V1), (3, "third", V2)] {
        db.insert(
            table.name(),
            vec![
                Value::Integer(id),
                Value::from(title),
                Value::Timestamp(ts(version)),
            ],
        )
        .unwrap();
    }
    (db, table)
}

pub fn stored_post(db: &MemoryDatabase, table: &TableDescriptor, id: i64) -> Option<Row> {
    db.scan(table.name())
        .unwrap()
        .into_iter()
        .find(|row| row[0] == Value::Integer(id))
}

pub fn update_request(id: i64, version: &str, title: &str) -> MutationRequest {
    MutationRequest::new()
        .with("id", json!(id))
        .with("updatedAt", json!(version))
        .with("patch", json!({ "title": title }))
}

pub fn delete_request(id: i64, version: &str) -> MutationRequest {
    MutationRequest::new()
        .with("id", json!(id))
        .with("updatedAt", json!(version))
}

pub fn guarded_registry() -> HookRegistry<MemoryTransaction> {
    let mut registry = HookRegistry::new();
    registry.register(OptimisticLockGuard::for_column("updated_at").unwrap());
    registry
}

pub fn table_executor() -> CountingExecutor<TableMutationExecutor> {
    CountingExecutor::new(TableMutationExecutor::new().touch_version_column("updated_at"))
}

/// Counts how often the wrapped executor is reached.
pub struct CountingExecutor<E> {
    inner: E,
    calls: AtomicUsize,
}

impl<E> CountingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T, E> MutationExecutor<T> for CountingExecutor<E>
where
    T: ?Sized + Send + 'static,
    E: MutationExecutor<T>,
{
    async fn execute(
        &self,
        tx: &mut T,
        scope: &MutationScope,
        request: &MutationRequest,
    ) -> Result<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(tx, scope, request).await
    }
}

/// Executor returning a fixed outcome without touching storage.
pub struct StubExecutor {
    pub fail_with: Option<String>,
    pub seen: std::sync::Mutex<Vec<MutationRequest>>,
}

impl StubExecutor {
    pub fn ok() -> Self {
        Self {
            fail_with: None,
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl<T: ?Sized + Send + 'static> MutationExecutor<T> for StubExecutor {
    async fn execute(
        &self,
        _tx: &mut T,
        _scope: &MutationScope,
        request: &MutationRequest,
    ) -> Result<QueryResult> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.fail_with {
            Some(message) => Err(DbError::ExecutionError(message.clone())),
            None => Ok(QueryResult::updated(1)),
        }
    }
}

/// Transaction double that records verification queries and answers with
/// canned rows.
pub struct RecordingTransaction {
    pub queries: Vec<VerificationQuery>,
    pub response: Vec<Row>,
}

impl RecordingTransaction {
    pub fn answering(response: Vec<Row>) -> Self {
        Self {
            queries: Vec::new(),
            response,
        }
    }
}

#[async_trait]
impl RowLockingTransaction for RecordingTransaction {
    async fn query_locked(&mut self, query: &VerificationQuery) -> Result<Vec<Row>> {
        self.queries.push(query.clone());
        Ok(self.response.clone())
    }
}

pub fn short_lock_timeout() -> MemoryDatabaseConfig {
    MemoryDatabaseConfig::new().lock_timeout(Duration::from_millis(100))
}
