//! Core traits, settings, and module registry for folio.

pub mod module;
pub mod registry;
pub mod settings;

pub use folio_db::Migration;
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
