// ============================================================================
// rowguard Library
// ============================================================================
//
// Optimistic concurrency control for row updates and deletes. A client must
// send back the version value it last read; the mutation only runs if the
// row, locked for update inside the same transaction, still carries it.
//
// ============================================================================

pub mod catalog;
pub mod config;
pub mod core;
pub mod guard;
pub mod hooks;
pub mod locate;
pub mod memory;
pub mod node_id;
pub mod query;
pub mod result;

pub use catalog::{
    Attribute, CamelCaseInflector, Inflector, QualifiedName, StorageConverter, TableDescriptor,
    TableTags, ValueConverter,
};
pub use config::GuardConfig;
pub use crate::core::{DataType, DbError, ErrorKind, Result, Row, Value};
pub use guard::OptimisticLockGuard;
pub use hooks::{
    HookRegistry, HostServices, InputField, InputKind, InputObjectFragment, InputTypeHook,
    InputTypeScope, MutationExecutor, MutationHook, MutationKind, MutationRequest, MutationScope,
    RowLockingTransaction, ScalarType,
};
pub use locate::{LocateMode, RowCondition};
pub use memory::{MemoryDatabase, MemoryDatabaseConfig, MemoryTransaction, TableMutationExecutor};
pub use node_id::{Base64JsonCodec, DecodedNodeId, NodeIdCodec};
pub use query::{SqlStatement, VerificationQuery};
pub use result::QueryResult;
