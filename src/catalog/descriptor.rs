use crate::core::{DataType, DbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `namespace.name` pair identifying a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{}.{}", quote_ident(&self.namespace), quote_ident(&self.name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    /// Varchar length or timestamp fractional-second precision.
    #[serde(default)]
    pub type_modifier: Option<i32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            type_modifier: None,
            nullable: true,
        }
    }

    pub fn type_modifier(mut self, modifier: i32) -> Self {
        self.type_modifier = Some(modifier);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Typed table-level smart tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTags {
    /// Disables optimistic lock verification for the table entirely.
    #[serde(default)]
    pub omit_optimistic_lock: bool,
}

/// Read-only description of a table, resolved once when the schema is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    name: QualifiedName,
    attributes: Vec<Attribute>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    tags: TableTags,
}

impl TableDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::new(namespace, name),
            attributes: Vec::new(),
            primary_key: Vec::new(),
            type_name: None,
            tags: TableTags::default(),
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Overrides the inflected node type name.
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn tags(mut self, tags: TableTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn declared_type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn is_opted_out(&self) -> bool {
        self.tags.omit_optimistic_lock
    }

    pub fn find_attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.find_attribute_index(name).map(|idx| &self.attributes[idx])
    }

    pub fn primary_key_names(&self) -> &[String] {
        &self.primary_key
    }

    /// Primary-key attributes in declaration order.
    pub fn primary_key_attributes(&self) -> Result<Vec<&Attribute>> {
        self.primary_key
            .iter()
            .map(|column| {
                self.find_attribute(column).ok_or_else(|| {
                    DbError::ColumnNotFound(column.clone(), self.name.to_string())
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts() -> TableDescriptor {
        TableDescriptor::new("app", "posts")
            .attribute(Attribute::new("id", DataType::Integer).not_null())
            .attribute(Attribute::new("title", DataType::Varchar).type_modifier(80))
            .attribute(Attribute::new("updated_at", DataType::Timestamp).not_null())
            .primary_key(&["id"])
    }

    #[test]
    fn test_attribute_lookup() {
        let table = posts();
        assert_eq!(table.find_attribute_index("updated_at"), Some(2));
        assert_eq!(
            table.find_attribute("title").and_then(|a| a.type_modifier),
            Some(80)
        );
        assert!(table.find_attribute("missing").is_none());
    }

    #[test]
    fn test_primary_key_must_exist() {
        let table = posts();
        assert_eq!(table.primary_key_attributes().unwrap().len(), 1);

        let broken = posts().primary_key(&["id", "slug"]);
        assert!(matches!(
            broken.primary_key_attributes(),
            Err(DbError::ColumnNotFound(column, _)) if column == "slug"
        ));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(posts().name().to_sql(), "\"app\".\"posts\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{
            "name": {"namespace": "app", "name": "audit_log"},
            "attributes": [{"name": "id", "data_type": "Integer"}],
            "tags": {"omit_optimistic_lock": true}
        }"#;
        let table: TableDescriptor = serde_json::from_str(json).unwrap();
        assert!(table.is_opted_out());
        assert!(table.attributes()[0].nullable);
        assert!(table.primary_key_names().is_empty());
    }
}
