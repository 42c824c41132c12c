//! Lookups one module needs from the other.
//!
//! Books validate and expand authors through [`AuthorDirectory`]; authors
//! check for dependent books through [`BookDirectory`]. The services only
//! know each other through these traits.

use async_trait::async_trait;
use folio_http::AppError;

use super::authors::models::Author;
use super::books::models::Book;

#[async_trait]
pub trait AuthorDirectory: Send + Sync {
    /// The author with this id, or `AppError::NotFound`.
    async fn get_by_id(&self, id: &str) -> Result<Author, AppError>;

    /// Authors among `ids` that exist. Missing ids are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Author>, AppError>;
}

#[async_trait]
pub trait BookDirectory: Send + Sync {
    /// Every book referencing the author, with the author expanded.
    async fn find_by_author_id(&self, author_id: &str) -> Result<Vec<Book>, AppError>;
}
