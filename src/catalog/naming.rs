use super::{Attribute, TableDescriptor};

/// Field-naming convention shared by every generated input type.
pub trait Inflector: Send + Sync {
    /// Client-facing field name for a column.
    fn column_field(&self, attribute: &Attribute) -> String;

    /// Type tag carried inside global identifiers for rows of `table`.
    fn node_type(&self, table: &TableDescriptor) -> String;
}

/// `updated_at` -> `updatedAt`, `blog_posts` -> `BlogPost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CamelCaseInflector;

impl Inflector for CamelCaseInflector {
    fn column_field(&self, attribute: &Attribute) -> String {
        camel_case(&attribute.name)
    }

    fn node_type(&self, table: &TableDescriptor) -> String {
        match table.declared_type_name() {
            Some(name) => name.to_string(),
            None => pascal_case(&singularize_last_word(&table.name().name)),
        }
    }
}

pub fn camel_case(input: &str) -> String {
    let pascal = pascal_case(input);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn pascal_case(input: &str) -> String {
    input
        .split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn singularize_last_word(input: &str) -> String {
    let (head, last) = match input.rfind('_') {
        Some(idx) => (&input[..=idx], &input[idx + 1..]),
        None => ("", input),
    };
    format!("{}{}", head, singularize(last))
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if word.ends_with("sses") || word.ends_with("uses") {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}
