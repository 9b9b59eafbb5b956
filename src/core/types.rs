use super::Value;

pub type Row = Vec<Value>;
