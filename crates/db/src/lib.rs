//! SurrealDB document store adapter for folio.
//!
//! The adapter exposes a small, Mongo-flavoured document API over SurrealDB
//! tables and translates raw engine faults into the closed [`StoreError`] set
//! so callers never have to inspect engine-specific error text.

pub mod clock;
pub mod client;
pub mod collection;
pub mod error;
pub mod migrate;
pub mod record;
pub mod schema;

pub use client::{ConnectOptions, Database};
pub use collection::{Collection, Filter, Window, MAX_WINDOW};
pub use error::{DuplicateField, FaultKind, FieldFault, StoreError, StoreResult};
pub use migrate::Migration;
pub use record::RecordKey;
pub use schema::{CollectionSchema, FieldRule, UniqueIndex};
