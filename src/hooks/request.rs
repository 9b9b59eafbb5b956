use crate::catalog::TableDescriptor;
use crate::core::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Client-supplied mutation input: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationRequest {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl MutationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(fields) => Ok(Self { fields }),
            other => Err(DbError::InvalidInput(format!(
                "mutation input must be an object, got {}",
                other
            ))),
        }
    }

    pub fn with(mut self, field: &str, value: serde_json::Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Other,
}

/// Context for one mutation field resolution.
#[derive(Debug, Clone)]
pub struct MutationScope {
    pub table: Arc<TableDescriptor>,
    pub kind: MutationKind,
    /// Top-level mutation field, as opposed to a nested one.
    pub root: bool,
}

impl MutationScope {
    pub fn new(table: Arc<TableDescriptor>, kind: MutationKind) -> Self {
        Self {
            table,
            kind,
            root: true,
        }
    }

    pub fn update(table: Arc<TableDescriptor>) -> Self {
        Self::new(table, MutationKind::Update)
    }

    pub fn delete(table: Arc<TableDescriptor>) -> Self {
        Self::new(table, MutationKind::Delete)
    }

    pub fn nested(mut self) -> Self {
        self.root = false;
        self
    }

    pub fn is_root_update_or_delete(&self) -> bool {
        self.root && matches!(self.kind, MutationKind::Update | MutationKind::Delete)
    }
}
