//! Declared collection schemas.
//!
//! SurrealDB enforces types and unique indexes itself; the declarations here
//! let the adapter report violations per field, using the public field names,
//! instead of leaking engine messages.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{DuplicateField, FaultKind, FieldFault, StoreError};

/// Constraint on a single stored field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// Column name in the table.
    pub column: &'static str,
    /// Public (camelCase) name reported back to clients.
    pub path: &'static str,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(column: &'static str, path: &'static str) -> Self {
        Self {
            column,
            path,
            required: true,
        }
    }

    pub const fn optional(column: &'static str, path: &'static str) -> Self {
        Self {
            column,
            path,
            required: false,
        }
    }
}

/// A unique index defined on the table.
#[derive(Debug, Clone, Copy)]
pub struct UniqueIndex {
    pub name: &'static str,
    pub column: &'static str,
    pub path: &'static str,
}

/// Static description of a collection.
#[derive(Debug)]
pub struct CollectionSchema {
    pub table: &'static str,
    pub fields: &'static [FieldRule],
    pub unique: &'static [UniqueIndex],
}

impl CollectionSchema {
    /// Check a full document before insertion.
    pub fn validate_insert(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        let faults: Vec<FieldFault> = self
            .fields
            .iter()
            .filter(|rule| rule.required && is_blank(doc.get(rule.column)))
            .map(|rule| FieldFault::new(rule.path, FaultKind::Required, "is required."))
            .collect();
        into_result(faults)
    }

    /// Check a partial update. Only fields present in the patch are examined.
    pub fn validate_patch(&self, patch: &Map<String, Value>) -> Result<(), StoreError> {
        let faults: Vec<FieldFault> = self
            .fields
            .iter()
            .filter(|rule| rule.required)
            .filter(|rule| matches!(patch.get(rule.column), Some(value) if is_blank(Some(value))))
            .map(|rule| FieldFault::new(rule.path, FaultKind::Required, "is required."))
            .collect();
        into_result(faults)
    }

    /// Public path for a column, falling back to the column name.
    pub fn path_of(&self, column: &str) -> String {
        self.fields
            .iter()
            .find(|rule| rule.column == column)
            .map(|rule| rule.path.to_string())
            .unwrap_or_else(|| column.to_string())
    }

    /// Translate an engine error raised while operating on this collection.
    pub fn translate(&self, err: surrealdb::Error) -> StoreError {
        let raw = err.to_string();

        if let Some(captures) = duplicate_pattern().captures(&raw) {
            let index = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = captures.get(2).map(|m| clean_value(m.as_str()));
            let fields = self
                .unique
                .iter()
                .filter(|unique| unique.name == index)
                .map(|unique| DuplicateField {
                    path: unique.path.to_string(),
                    value: value.clone(),
                })
                .collect();
            return StoreError::DuplicateKey { fields, raw };
        }

        if let Some(captures) = field_pattern().captures(&raw) {
            let column = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let detail = captures
                .get(2)
                .map(|m| format!("must conform to {}.", m.as_str().trim()))
                .unwrap_or_else(|| "is invalid.".to_string());
            return StoreError::Validation {
                faults: vec![FieldFault::new(
                    self.path_of(column),
                    FaultKind::Other,
                    &detail,
                )],
            };
        }

        StoreError::from(err)
    }
}

fn into_result(faults: Vec<FieldFault>) -> Result<(), StoreError> {
    if faults.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation { faults })
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

// "Database index `book_isbn_unique` already contains '978...', with record `book:...`"
fn duplicate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"index `([^`]+)` already contains (.+?)(?:, with record|$)")
            .expect("duplicate index pattern is valid")
    })
}

// "Found '' for field `title`, with record `book:...`, but field must conform to: $value != \"\""
fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"for field `([^`]+)`(?:.*?must conform to:\s*(.+))?")
            .expect("field constraint pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static BOOKS: CollectionSchema = CollectionSchema {
        table: "book",
        fields: &[
            FieldRule::required("title", "title"),
            FieldRule::required("isbn", "isbn"),
            FieldRule::optional("genre", "genre"),
            FieldRule::required("author_id", "authorId"),
        ],
        unique: &[UniqueIndex {
            name: "book_isbn_unique",
            column: "isbn",
            path: "isbn",
        }],
    };

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn insert_reports_every_missing_required_field() {
        let doc = object(json!({ "title": "  ", "genre": "Drama" }));
        let Err(StoreError::Validation { faults }) = BOOKS.validate_insert(&doc) else {
            panic!("expected validation failure");
        };

        let paths: Vec<&str> = faults.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["title", "isbn", "authorId"]);
        assert!(faults.iter().all(|f| f.kind == FaultKind::Required));
        assert_eq!(faults[2].message, "Path `authorId` is required.");
    }

    #[test]
    fn patch_only_checks_supplied_fields() {
        assert!(BOOKS
            .validate_patch(&object(json!({ "genre": "" })))
            .is_ok());

        let Err(StoreError::Validation { faults }) =
            BOOKS.validate_patch(&object(json!({ "title": "" })))
        else {
            panic!("expected validation failure");
        };
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].path, "title");
    }

    #[test]
    fn duplicate_pattern_extracts_index_and_value() {
        let raw = "Database index `book_isbn_unique` already contains '9780141439518', with record `book:abc`";
        let captures = duplicate_pattern().captures(raw).unwrap();
        assert_eq!(&captures[1], "book_isbn_unique");
        assert_eq!(clean_value(&captures[2]), "9780141439518");
    }

    #[test]
    fn clean_value_strips_array_and_quotes() {
        assert_eq!(clean_value("['978-3-16-148410-0']"), "978-3-16-148410-0");
        assert_eq!(clean_value("\"x\""), "x");
    }

    #[test]
    fn field_pattern_extracts_column_and_constraint() {
        let raw = "Found '' for field `first_name`, with record `author:a`, but field must conform to: $value != ''";
        let captures = field_pattern().captures(raw).unwrap();
        assert_eq!(&captures[1], "first_name");
        assert_eq!(captures[2].trim(), "$value != ''");
    }
}
