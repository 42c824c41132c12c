pub mod authors;
pub mod books;
pub mod directory;

use std::sync::Arc;

use folio_db::Database;
use folio_kernel::ModuleRegistry;

use authors::{service::AuthorService, AuthorsModule};
use books::{service::BookService, BooksModule};
use directory::BookDirectory;

/// Build the services over `db`, wire their cross references and register
/// the modules that expose them.
pub fn register_all(db: &Database) -> ModuleRegistry {
    let authors = Arc::new(AuthorService::new(db.clone()));
    let books = Arc::new(BookService::new(db.clone(), authors.clone()));

    let book_directory: Arc<dyn BookDirectory> = books.clone();
    authors.bind_books(Arc::downgrade(&book_directory));

    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(AuthorsModule::new(authors)));
    registry.register(Arc::new(BooksModule::new(books)));
    registry
}
