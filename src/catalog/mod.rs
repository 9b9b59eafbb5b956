pub mod convert;
pub mod descriptor;
pub mod naming;

pub use convert::{StorageConverter, ValueConverter, parse_timestamp};
pub use descriptor::{Attribute, QualifiedName, TableDescriptor, TableTags, quote_ident};
pub use naming::{CamelCaseInflector, Inflector};
