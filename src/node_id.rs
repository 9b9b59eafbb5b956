//! Opaque global identifiers.
//!
//! A node id packs a type tag and the row's primary-key values into a single
//! client-facing string. The default encoding is base64 over a JSON array
//! whose first element is the tag: `base64(["Post", 1])`.

use crate::core::{DbError, Result};
use base64::prelude::*;

/// A decoded node id: type tag plus primary-key values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNodeId {
    pub type_name: String,
    pub values: Vec<serde_json::Value>,
}

pub trait NodeIdCodec: Send + Sync {
    fn encode(&self, type_name: &str, values: &[serde_json::Value]) -> Result<String>;

    fn decode(&self, node_id: &str) -> Result<DecodedNodeId>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Base64JsonCodec;

impl NodeIdCodec for Base64JsonCodec {
    fn encode(&self, type_name: &str, values: &[serde_json::Value]) -> Result<String> {
        let mut parts = Vec::with_capacity(values.len() + 1);
        parts.push(serde_json::Value::String(type_name.to_string()));
        parts.extend(values.iter().cloned());
        let json = serde_json::to_string(&parts)
            .map_err(|e| DbError::ExecutionError(format!("node id encoding failed: {}", e)))?;
        Ok(BASE64_STANDARD.encode(json))
    }

    fn decode(&self, node_id: &str) -> Result<DecodedNodeId> {
        let bytes = BASE64_STANDARD
            .decode(node_id)
            .map_err(|e| DbError::InvalidNodeId(format!("not base64: {}", e)))?;
        let parts: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|e| DbError::InvalidNodeId(format!("not a JSON array: {}", e)))?;

        let mut parts = parts.into_iter();
        let type_name = match parts.next() {
            Some(serde_json::Value::String(name)) => name,
            _ => {
                return Err(DbError::InvalidNodeId(
                    "missing type tag".to_string(),
                ));
            }
        };

        Ok(DecodedNodeId {
            type_name,
            values: parts.collect(),
        })
    }
}
