use std::sync::{OnceLock, Weak};

use anyhow::anyhow;
use async_trait::async_trait;
use folio_db::{Collection, Database, Filter};
use folio_http::AppError;

use super::models::{
    Author, AuthorFields, AuthorQuery, AuthorRow, CreateAuthor, UpdateAuthor, AUTHOR_SCHEMA,
};
use crate::modules::directory::{AuthorDirectory, BookDirectory};
use crate::utils::Page;

const NOT_FOUND: &str = "Author not found";
const SEARCH_COLUMNS: &[&str] = &["first_name", "last_name"];

pub struct AuthorService {
    authors: Collection<AuthorRow>,
    books: OnceLock<Weak<dyn BookDirectory>>,
}

impl AuthorService {
    pub fn new(db: Database) -> Self {
        Self {
            authors: Collection::new(db, &AUTHOR_SCHEMA),
            books: OnceLock::new(),
        }
    }

    /// Wire in the book lookup used by [`AuthorService::delete`]. Only the
    /// first binding takes effect.
    pub fn bind_books(&self, books: Weak<dyn BookDirectory>) {
        if self.books.set(books).is_err() {
            tracing::warn!(module = "authors", "book directory already bound, ignoring");
        }
    }

    pub async fn create(&self, input: CreateAuthor) -> Result<Author, AppError> {
        let row = self.authors.create(&AuthorFields::from(input)).await?;
        tracing::debug!(module = "authors", id = %row.doc_id, "author created");
        Ok(row.into())
    }

    pub async fn list(&self, query: &AuthorQuery) -> Result<Page<Author>, AppError> {
        let request = query.page_request();
        let filter = Filter::new().contains_any(SEARCH_COLUMNS, query.search());

        let total = self.authors.count_documents(&filter).await?;
        let rows = self.authors.find(&filter, Some(request.window())).await?;

        Ok(Page::new(
            rows.into_iter().map(Author::from).collect(),
            request,
            total,
        ))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Author, AppError> {
        self.authors
            .find_by_id(id)
            .await?
            .map(Author::from)
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }

    pub async fn update(&self, id: &str, input: UpdateAuthor) -> Result<Author, AppError> {
        self.authors
            .find_by_id_and_update(id, &AuthorFields::from(input))
            .await?
            .map(Author::from)
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }

    /// Delete an author that no book references.
    ///
    /// The dependent check and the delete are separate store calls; a book
    /// created in between is not detected.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let books = self
            .books
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AppError::Internal(anyhow!("book directory is not bound")))?;

        let dependents = books.find_by_author_id(id).await?;
        if !dependents.is_empty() {
            tracing::info!(
                module = "authors",
                id,
                books = dependents.len(),
                "refusing to delete author with books"
            );
            return Err(AppError::conflict(
                "Cannot delete author with associated books",
            ));
        }

        self.authors
            .find_by_id_and_delete(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }
}

#[async_trait]
impl AuthorDirectory for AuthorService {
    async fn get_by_id(&self, id: &str) -> Result<Author, AppError> {
        AuthorService::get_by_id(self, id).await
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Author>, AppError> {
        let rows = self.authors.find_by_ids(ids).await?;
        Ok(rows.into_iter().map(Author::from).collect())
    }
}
