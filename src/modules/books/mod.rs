pub mod models;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use folio_http::{AppError, Validated, ValidatedQuery};
use folio_kernel::{InitCtx, Migration, Module};

use crate::utils::Page;
use models::{Book, BookQuery, CreateBook, UpdateBook};
use service::BookService;

/// Books module: CRUD routes over the `book` table.
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(service: Arc<BookService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route("/{id}", get(get_book).patch(update_book).delete(delete_book))
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "search", "in": "query", "schema": { "type": "string" } },
                            { "name": "authorId", "in": "query", "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "One page of books",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "data": {
                                                    "type": "array",
                                                    "items": { "$ref": "#/components/schemas/Book" }
                                                },
                                                "pagination": { "$ref": "#/components/schemas/Pagination" }
                                            }
                                        }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/BookError" }
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Book created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/BookError" },
                            "409": { "$ref": "#/components/responses/BookError" }
                        }
                    }
                },
                "/{id}": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": { "$ref": "#/components/responses/BookError" }
                        }
                    },
                    "patch": {
                        "summary": "Update a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "The updated book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/BookError" },
                            "404": { "$ref": "#/components/responses/BookError" },
                            "409": { "$ref": "#/components/responses/BookError" }
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "responses": {
                            "204": { "description": "Book deleted" },
                            "404": { "$ref": "#/components/responses/BookError" }
                        }
                    }
                }
            },
            "components": {
                "responses": {
                    "BookError": {
                        "description": "Error envelope",
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                            }
                        }
                    }
                },
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "isbn": { "type": "string" },
                            "publishedDate": { "type": "string", "format": "date" },
                            "genre": { "type": "string" },
                            "author": {
                                "nullable": true,
                                "allOf": [{ "$ref": "#/components/schemas/Author" }]
                            },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "isbn", "author", "createdAt", "updatedAt"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "isbn": { "type": "string" },
                            "publishedDate": { "type": "string", "format": "date" },
                            "genre": { "type": "string" },
                            "authorId": { "type": "string", "pattern": "^[0-9a-fA-F]{24}$" }
                        },
                        "required": ["title", "isbn", "authorId"],
                        "additionalProperties": false
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                DEFINE TABLE IF NOT EXISTS book SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS title          ON book TYPE string ASSERT $value != "";
                DEFINE FIELD IF NOT EXISTS isbn           ON book TYPE string ASSERT $value != "";
                DEFINE FIELD IF NOT EXISTS published_date ON book TYPE option<string>;
                DEFINE FIELD IF NOT EXISTS genre          ON book TYPE option<string>;
                DEFINE FIELD IF NOT EXISTS author_id      ON book TYPE string;
                DEFINE FIELD IF NOT EXISTS created_at     ON book TYPE string;
                DEFINE FIELD IF NOT EXISTS updated_at     ON book TYPE string;
                DEFINE INDEX IF NOT EXISTS book_isbn_unique ON book FIELDS isbn UNIQUE;
                DEFINE INDEX IF NOT EXISTS book_author_idx  ON book FIELDS author_id;
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    Validated(input): Validated<CreateBook>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn list_books(
    State(service): State<Arc<BookService>>,
    ValidatedQuery(query): ValidatedQuery<BookQuery>,
) -> Result<Json<Page<Book>>, AppError> {
    Ok(Json(service.list(&query).await?))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get_by_id(&id).await?))
}

async fn update_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
    Validated(input): Validated<UpdateBook>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.update(&id, input).await?))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
