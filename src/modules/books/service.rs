use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use folio_db::{Collection, Database, Filter};
use folio_http::AppError;

use super::models::{Book, BookFields, BookQuery, BookRow, CreateBook, UpdateBook, BOOK_SCHEMA};
use crate::modules::authors::models::Author;
use crate::modules::directory::{AuthorDirectory, BookDirectory};
use crate::utils::Page;

const NOT_FOUND: &str = "Book not found";
const INVALID_AUTHOR: &str = "Invalid authorId: Author does not exist";
const SEARCH_COLUMNS: &[&str] = &["title", "isbn"];

pub struct BookService {
    books: Collection<BookRow>,
    authors: Arc<dyn AuthorDirectory>,
}

impl BookService {
    pub fn new(db: Database, authors: Arc<dyn AuthorDirectory>) -> Self {
        Self {
            books: Collection::new(db, &BOOK_SCHEMA),
            authors,
        }
    }

    /// Create a book for an existing author.
    ///
    /// The author check and the insert are separate store calls; an author
    /// deleted in between leaves a dangling reference.
    pub async fn create(&self, input: CreateBook) -> Result<Book, AppError> {
        let fields = BookFields::from(input);
        let author = match fields.author_id.as_deref() {
            Some(author_id) => self.require_author(author_id).await?,
            None => return Err(AppError::bad_request(INVALID_AUTHOR)),
        };

        let row = self.books.create(&fields).await?;
        tracing::debug!(module = "books", id = %row.doc_id, author = %author.id, "book created");
        Ok(Book::from_row(row, Some(author)))
    }

    pub async fn list(&self, query: &BookQuery) -> Result<Page<Book>, AppError> {
        let request = query.page_request();
        let author_id = query.author_id();
        let filter = Filter::new()
            .contains_any(SEARCH_COLUMNS, query.search())
            .equals("author_id", author_id.as_deref());

        let total = self.books.count_documents(&filter).await?;
        let rows = self.books.find(&filter, Some(request.window())).await?;

        Ok(Page::new(self.expand(rows).await?, request, total))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Book, AppError> {
        let row = self
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
        self.expand_one(row).await
    }

    pub async fn update(&self, id: &str, input: UpdateBook) -> Result<Book, AppError> {
        let fields = BookFields::from(input);
        if let Some(author_id) = fields.author_id.as_deref() {
            self.require_author(author_id).await?;
        }

        let row = self
            .books
            .find_by_id_and_update(id, &fields)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
        self.expand_one(row).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.books
            .find_by_id_and_delete(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }

    pub async fn find_by_author_id(&self, author_id: &str) -> Result<Vec<Book>, AppError> {
        let author_id = author_id.to_ascii_lowercase();
        let filter = Filter::new().equals("author_id", Some(author_id.as_str()));
        let rows = self.books.find(&filter, None).await?;
        self.expand(rows).await
    }

    async fn require_author(&self, author_id: &str) -> Result<Author, AppError> {
        match self.authors.get_by_id(author_id).await {
            Err(AppError::NotFound { .. }) => Err(AppError::bad_request(INVALID_AUTHOR)),
            other => other,
        }
    }

    async fn expand_one(&self, row: BookRow) -> Result<Book, AppError> {
        let mut books = self.expand(vec![row]).await?;
        books
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("expanded book went missing")))
    }

    /// Attach each book's author, fetched in one lookup.
    async fn expand(&self, rows: Vec<BookRow>) -> Result<Vec<Book>, AppError> {
        let mut ids: Vec<String> = rows.iter().map(|row| row.author_id.clone()).collect();
        ids.sort();
        ids.dedup();

        let authors: HashMap<String, Author> = self
            .authors
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|author| (author.id.clone(), author))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let author = authors.get(&row.author_id).cloned();
                Book::from_row(row, author)
            })
            .collect())
    }
}

#[async_trait]
impl BookDirectory for BookService {
    async fn find_by_author_id(&self, author_id: &str) -> Result<Vec<Book>, AppError> {
        BookService::find_by_author_id(self, author_id).await
    }
}
