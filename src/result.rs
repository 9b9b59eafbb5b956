use crate::core::Row;

/// Outcome of a mutation executor: rows affected plus any returned rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub affected_rows: usize,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
        }
    }

    pub fn updated(count: usize) -> Self {
        Self {
            affected_rows: count,
            ..Self::empty()
        }
    }

    pub fn deleted(count: usize) -> Self {
        Self::updated(count)
    }

    pub fn with_rows(mut self, columns: Vec<String>, rows: Vec<Row>) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }
}
