use crate::catalog::TableDescriptor;
use crate::core::{DataType, DbError, Result};
use std::fmt;
use std::sync::Arc;

/// What a generated input object is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Create,
    /// Outer input of an update mutation (identifying fields + patch).
    Update,
    /// Outer input of a delete mutation.
    Delete,
    /// The patch object nested inside an update input.
    Patch,
    Other,
}

/// Context handed to input-type hooks while one input object is being built.
#[derive(Debug, Clone)]
pub struct InputTypeScope {
    pub table: Arc<TableDescriptor>,
    pub kind: InputKind,
}

impl InputTypeScope {
    pub fn new(table: Arc<TableDescriptor>, kind: InputKind) -> Self {
        Self { table, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Float,
    String,
    Boolean,
    Datetime,
    Uuid,
    /// Opaque global node id.
    Id,
    /// A nested input object, by type name.
    Object(String),
}

impl ScalarType {
    pub fn for_data_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Integer => Self::Int,
            DataType::Float => Self::Float,
            DataType::Text | DataType::Varchar => Self::String,
            DataType::Boolean => Self::Boolean,
            DataType::Timestamp => Self::Datetime,
            DataType::Uuid => Self::Uuid,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "Int"),
            Self::Float => write!(f, "Float"),
            Self::String => write!(f, "String"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Datetime => write!(f, "Datetime"),
            Self::Uuid => write!(f, "UUID"),
            Self::Id => write!(f, "ID"),
            Self::Object(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputField {
    pub name: String,
    pub field_type: ScalarType,
    pub nullable: bool,
    pub description: Option<String>,
}

impl InputField {
    pub fn new(name: impl Into<String>, field_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.field_type)?;
        if !self.nullable {
            write!(f, "!")?;
        }
        Ok(())
    }
}

/// The field list of one generated input object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputObjectFragment {
    pub type_name: String,
    fields: Vec<InputField>,
}

impl InputObjectFragment {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder form of [`Self::add_field`] for fragments assembled by hand.
    pub fn field(mut self, field: InputField) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a field, refusing to shadow an existing one.
    pub fn add_field(mut self, field: InputField) -> Result<Self> {
        if self.get_field(&field.name).is_some() {
            return Err(DbError::SchemaConflict(format!(
                "input type '{}' already has a field named '{}'",
                self.type_name, field.name
            )));
        }
        self.fields.push(field);
        Ok(self)
    }

    pub fn fields(&self) -> &[InputField] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&InputField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl fmt::Display for InputObjectFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {} {{", self.type_name)?;
        for field in &self.fields {
            write!(f, " {}", field)?;
        }
        write!(f, " }}")
    }
}
