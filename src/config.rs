use crate::core::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOLERANCE_MICROS: u64 = 5;
pub const DEFAULT_NODE_ID_FIELD: &str = "nodeId";
pub const DEFAULT_FIELD_DESCRIPTION: &str = "The value of the existing row to be updated/deleted.";

/// Configuration for one optimistic lock guard.
///
/// The version column is the only required input; a guard built from it can
/// be registered for every table and skips the ones lacking the column.
///
/// # Examples
///
/// ```
/// use rowguard::GuardConfig;
/// use std::time::Duration;
///
/// let config = GuardConfig::new("updated_at")
///     .tolerance(Duration::from_micros(10))
///     .node_id_field("id");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    pub version_column: String,

    /// Half-width of the window within which the client-supplied version
    /// is considered equal to the stored one.
    #[serde(default = "default_tolerance_micros")]
    pub tolerance_micros: u64,

    /// Request field holding a global node id.
    #[serde(default = "default_node_id_field")]
    pub node_id_field: String,

    /// Description attached to the generated version field.
    #[serde(default = "default_field_description")]
    pub field_description: String,
}

fn default_tolerance_micros() -> u64 {
    DEFAULT_TOLERANCE_MICROS
}

fn default_node_id_field() -> String {
    DEFAULT_NODE_ID_FIELD.to_string()
}

fn default_field_description() -> String {
    DEFAULT_FIELD_DESCRIPTION.to_string()
}

impl GuardConfig {
    pub fn new(version_column: &str) -> Self {
        Self {
            version_column: version_column.to_string(),
            tolerance_micros: DEFAULT_TOLERANCE_MICROS,
            node_id_field: default_node_id_field(),
            field_description: default_field_description(),
        }
    }

    /// Parse from JSON, e.g. `{"version_column": "updated_at", "tolerance_micros": 1}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DbError::Config(format!("invalid guard config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Sub-microsecond parts are dropped; windows beyond `u64::MAX` µs
    /// saturate.
    pub fn tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance_micros = u64::try_from(tolerance.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn node_id_field(mut self, field: &str) -> Self {
        self.node_id_field = field.to_string();
        self
    }

    pub fn field_description(mut self, description: &str) -> Self {
        self.field_description = description.to_string();
        self
    }

    pub fn tolerance_duration(&self) -> Duration {
        Duration::from_micros(self.tolerance_micros)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version_column.trim().is_empty() {
            return Err(DbError::Config("version column must not be empty".into()));
        }
        if self.tolerance_micros == 0 {
            return Err(DbError::Config(
                "tolerance must be at least one microsecond".into(),
            ));
        }
        if self.node_id_field.trim().is_empty() {
            return Err(DbError::Config("node id field must not be empty".into()));
        }
        Ok(())
    }
}
