//! Row-locating conditions.
//!
//! A mutation names its target either by primary-key field values or by a
//! single global node id. Both paths end in the same conjunction of
//! `column = value` predicates, with each value already converted to the
//! column's storage representation.

use crate::catalog::{Attribute, TableDescriptor, quote_ident};
use crate::core::{DataType, DbError, Result, Row, Value};
use crate::hooks::{HostServices, MutationRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPredicate {
    pub column: String,
    pub data_type: DataType,
    pub value: Value,
}

/// Conjunction of equality predicates over key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCondition {
    predicates: Vec<ColumnPredicate>,
}

impl RowCondition {
    pub fn predicates(&self) -> &[ColumnPredicate] {
        &self.predicates
    }

    /// Evaluates the condition against a stored row of `table`.
    pub fn matches(&self, table: &TableDescriptor, row: &Row) -> Result<bool> {
        for predicate in &self.predicates {
            let idx = table.find_attribute_index(&predicate.column).ok_or_else(|| {
                DbError::ColumnNotFound(predicate.column.clone(), table.name().to_string())
            })?;
            let stored = row.get(idx).unwrap_or(&Value::Null);
            // NULL never equals anything, itself included
            if stored.is_null() || predicate.value.is_null() || *stored != predicate.value {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Renders `("a" = $n and "b" = $n+1)`, returning the SQL text and the
    /// parameters in placeholder order.
    pub fn to_sql(&self, first_placeholder: usize) -> (String, Vec<Value>) {
        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::with_capacity(self.predicates.len());
        for (offset, predicate) in self.predicates.iter().enumerate() {
            clauses.push(format!(
                "{} = ${}::{}",
                quote_ident(&predicate.column),
                first_placeholder + offset,
                predicate.data_type.sql_name()
            ));
            params.push(predicate.value.clone());
        }
        (format!("({})", clauses.join(" and ")), params)
    }
}

/// How a mutation identifies its target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
    PrimaryKey,
    NodeId,
}

/// Picks the identification mode from the fields the request carries.
pub fn locate_mode(request: &MutationRequest, node_id_field: &str) -> LocateMode {
    match request.field(node_id_field) {
        Some(value) if !value.is_null() => LocateMode::NodeId,
        _ => LocateMode::PrimaryKey,
    }
}

/// Builds the condition for whichever mode `request` uses.
pub fn locate_row(
    table: &TableDescriptor,
    request: &MutationRequest,
    node_id_field: &str,
    services: &HostServices,
) -> Result<RowCondition> {
    match locate_mode(request, node_id_field) {
        LocateMode::NodeId => {
            let node_id = request
                .field(node_id_field)
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    DbError::InvalidNodeId(format!("field '{}' must be a string", node_id_field))
                })?;
            condition_from_node_id(table, node_id, services)
        }
        LocateMode::PrimaryKey => condition_from_primary_key(table, request, services),
    }
}

/// Primary-key mode: one request field per key column, named by the inflector.
pub fn condition_from_primary_key(
    table: &TableDescriptor,
    request: &MutationRequest,
    services: &HostServices,
) -> Result<RowCondition> {
    let key_attributes = key_attributes(table)?;
    let mut values = Vec::with_capacity(key_attributes.len());
    for attribute in &key_attributes {
        let field = services.inflector.column_field(attribute);
        match request.field(&field) {
            Some(value) if !value.is_null() => values.push(value.clone()),
            Some(_) => {
                return Err(DbError::InvalidInput(format!(
                    "primary key field '{}' must not be null",
                    field
                )));
            }
            None => {
                return Err(DbError::InvalidInput(format!(
                    "missing primary key field '{}' for {}",
                    field,
                    table.name()
                )));
            }
        }
    }
    build_condition(&key_attributes, &values, services)
}

/// Global-identifier mode: decode, check the type tag and key arity, then
/// proceed as in primary-key mode.
pub fn condition_from_node_id(
    table: &TableDescriptor,
    node_id: &str,
    services: &HostServices,
) -> Result<RowCondition> {
    let decoded = services.node_ids.decode(node_id)?;
    let expected = services.inflector.node_type(table);
    if decoded.type_name != expected {
        return Err(DbError::MismatchedNodeType {
            expected,
            actual: decoded.type_name,
        });
    }

    let key_attributes = key_attributes(table)?;
    if decoded.values.len() != key_attributes.len() {
        return Err(DbError::InvalidNodeId(format!(
            "expected {} key value(s) for {}, got {}",
            key_attributes.len(),
            expected,
            decoded.values.len()
        )));
    }
    build_condition(&key_attributes, &decoded.values, services)
}

fn key_attributes(table: &TableDescriptor) -> Result<Vec<&Attribute>> {
    let attributes = table.primary_key_attributes()?;
    if attributes.is_empty() {
        return Err(DbError::InvalidInput(format!(
            "{} has no primary key; rows cannot be located",
            table.name()
        )));
    }
    Ok(attributes)
}

fn build_condition(
    attributes: &[&Attribute],
    values: &[serde_json::Value],
    services: &HostServices,
) -> Result<RowCondition> {
    let predicates = attributes
        .iter()
        .zip(values)
        .map(|(attribute, value)| {
            let value = services.converter.to_storage(
                value,
                &attribute.data_type,
                attribute.type_modifier,
            )?;
            Ok(ColumnPredicate {
                column: attribute.name.clone(),
                data_type: attribute.data_type.clone(),
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RowCondition { predicates })
}
