pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, ErrorKind, Result};
pub use types::Row;
pub use value::{DataType, Value};
