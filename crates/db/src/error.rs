//! Closed error set produced by the document store adapter.

use thiserror::Error;

/// Kind of a schema violation on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    Required,
    MinLength,
    MaxLength,
    Enum,
    Unique,
    /// Any other constraint reported by the engine.
    Other,
}

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFault {
    /// Public (camelCase) path of the offending field.
    pub path: String,
    pub kind: FaultKind,
    /// Store phrasing, prefixed with ``Path `field` ``.
    pub message: String,
}

impl FieldFault {
    pub fn new(path: impl Into<String>, kind: FaultKind, detail: &str) -> Self {
        let path = path.into();
        let message = format!("Path `{path}` {detail}");
        Self {
            path,
            kind,
            message,
        }
    }
}

/// A field/value pair that collided with a unique index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateField {
    pub path: String,
    pub value: Option<String>,
}

/// Failures surfaced by [`crate::Collection`] and [`crate::Database`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document violated the collection schema.
    #[error("document failed schema validation ({} field(s))", .faults.len())]
    Validation { faults: Vec<FieldFault> },

    /// An identifier could not be interpreted as a record key.
    #[error("cast to record key failed for value \"{value}\"")]
    Cast { value: String },

    /// A unique index rejected the write.
    #[error("duplicate key: {raw}")]
    DuplicateKey {
        /// Offending fields, when the index could be resolved.
        fields: Vec<DuplicateField>,
        /// Engine message, kept for fallback parsing.
        raw: String,
    },

    /// Anything else: connectivity, query or decoding faults.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Other(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(anyhow::Error::new(err).context("malformed document"))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
