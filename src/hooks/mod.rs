//! Host-facing extension points.
//!
//! The schema/execution host owns the orchestration: it asks every registered
//! [`InputTypeHook`] to extend an input object while building the schema, and
//! routes every mutation through the registered [`MutationHook`]s before the
//! terminal [`MutationExecutor`] runs.

pub mod registry;
pub mod request;
pub mod schema;

pub use registry::HookRegistry;
pub use request::{MutationKind, MutationRequest, MutationScope};
pub use schema::{InputField, InputKind, InputObjectFragment, InputTypeScope, ScalarType};

use crate::catalog::{CamelCaseInflector, Inflector, StorageConverter, ValueConverter};
use crate::core::{Result, Row};
use crate::node_id::{Base64JsonCodec, NodeIdCodec};
use crate::query::VerificationQuery;
use crate::result::QueryResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Extends a generated input object.
pub trait InputTypeHook: Send + Sync {
    fn augment_input_type(
        &self,
        scope: &InputTypeScope,
        fragment: InputObjectFragment,
    ) -> Result<InputObjectFragment>;
}

/// The mutation logic a hook wraps: the host's executor, or the rest of the
/// hook chain.
#[async_trait]
pub trait MutationExecutor<T: ?Sized + Send>: Send + Sync {
    async fn execute(
        &self,
        tx: &mut T,
        scope: &MutationScope,
        request: &MutationRequest,
    ) -> Result<QueryResult>;
}

/// Wraps mutation field resolution. Implementations decide whether to call
/// `next` (at most once) and return its result.
#[async_trait]
pub trait MutationHook<T: ?Sized + Send>: Send + Sync {
    async fn resolve(
        &self,
        tx: &mut T,
        scope: &MutationScope,
        request: &MutationRequest,
        next: &dyn MutationExecutor<T>,
    ) -> Result<QueryResult>;
}

/// A transaction able to run the locked verification read.
#[async_trait]
pub trait RowLockingTransaction: Send {
    /// Locks every row matched by `query.condition` until the transaction
    /// ends and returns one single-column boolean row per locked row.
    async fn query_locked(&mut self, query: &VerificationQuery) -> Result<Vec<Row>>;
}

/// Host collaborators shared by the guard and by executors that need to
/// locate rows the same way.
#[derive(Clone)]
pub struct HostServices {
    pub inflector: Arc<dyn Inflector>,
    pub converter: Arc<dyn ValueConverter>,
    pub node_ids: Arc<dyn NodeIdCodec>,
}

impl Default for HostServices {
    fn default() -> Self {
        Self {
            inflector: Arc::new(CamelCaseInflector),
            converter: Arc::new(StorageConverter),
            node_ids: Arc::new(Base64JsonCodec),
        }
    }
}

impl HostServices {
    pub fn with_inflector(mut self, inflector: Arc<dyn Inflector>) -> Self {
        self.inflector = inflector;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_node_ids(mut self, node_ids: Arc<dyn NodeIdCodec>) -> Self {
        self.node_ids = node_ids;
        self
    }
}
