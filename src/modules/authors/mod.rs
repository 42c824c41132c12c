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
use models::{Author, AuthorQuery, CreateAuthor, UpdateAuthor};
use service::AuthorService;

/// Authors module: CRUD routes over the `author` table.
pub struct AuthorsModule {
    service: Arc<AuthorService>,
}

impl AuthorsModule {
    pub fn new(service: Arc<AuthorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for AuthorsModule {
    fn name(&self) -> &'static str {
        "authors"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "authors module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_authors).post(create_author))
            .route(
                "/{id}",
                get(get_author).patch(update_author).delete(delete_author),
            )
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List authors",
                        "tags": ["Authors"],
                        "parameters": [
                            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "search", "in": "query", "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "One page of authors",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "data": {
                                                    "type": "array",
                                                    "items": { "$ref": "#/components/schemas/Author" }
                                                },
                                                "pagination": { "$ref": "#/components/schemas/Pagination" }
                                            }
                                        }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/AuthorError" }
                        }
                    },
                    "post": {
                        "summary": "Create an author",
                        "tags": ["Authors"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateAuthor" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Author created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Author" }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/AuthorError" }
                        }
                    }
                },
                "/{id}": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "get": {
                        "summary": "Get an author",
                        "tags": ["Authors"],
                        "responses": {
                            "200": {
                                "description": "The author",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Author" }
                                    }
                                }
                            },
                            "404": { "$ref": "#/components/responses/AuthorError" }
                        }
                    },
                    "patch": {
                        "summary": "Update an author",
                        "tags": ["Authors"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateAuthor" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "The updated author",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Author" }
                                    }
                                }
                            },
                            "404": { "$ref": "#/components/responses/AuthorError" }
                        }
                    },
                    "delete": {
                        "summary": "Delete an author without books",
                        "tags": ["Authors"],
                        "responses": {
                            "204": { "description": "Author deleted" },
                            "404": { "$ref": "#/components/responses/AuthorError" },
                            "409": { "$ref": "#/components/responses/AuthorError" }
                        }
                    }
                }
            },
            "components": {
                "responses": {
                    "AuthorError": {
                        "description": "Error envelope",
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                            }
                        }
                    }
                },
                "schemas": {
                    "Author": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "firstName": { "type": "string" },
                            "lastName": { "type": "string" },
                            "bio": { "type": "string" },
                            "birthDate": { "type": "string", "format": "date" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "firstName", "lastName", "createdAt", "updatedAt"]
                    },
                    "CreateAuthor": {
                        "type": "object",
                        "properties": {
                            "firstName": { "type": "string", "minLength": 1 },
                            "lastName": { "type": "string", "minLength": 1 },
                            "bio": { "type": "string" },
                            "birthDate": { "type": "string", "format": "date" }
                        },
                        "required": ["firstName", "lastName"],
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
                DEFINE TABLE IF NOT EXISTS author SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS first_name ON author TYPE string ASSERT $value != "";
                DEFINE FIELD IF NOT EXISTS last_name  ON author TYPE string ASSERT $value != "";
                DEFINE FIELD IF NOT EXISTS bio        ON author TYPE option<string>;
                DEFINE FIELD IF NOT EXISTS birth_date ON author TYPE option<string>;
                DEFINE FIELD IF NOT EXISTS created_at ON author TYPE string;
                DEFINE FIELD IF NOT EXISTS updated_at ON author TYPE string;
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "authors module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "authors module stopped");
        Ok(())
    }
}

async fn create_author(
    State(service): State<Arc<AuthorService>>,
    Validated(input): Validated<CreateAuthor>,
) -> Result<(StatusCode, Json<Author>), AppError> {
    let author = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

async fn list_authors(
    State(service): State<Arc<AuthorService>>,
    ValidatedQuery(query): ValidatedQuery<AuthorQuery>,
) -> Result<Json<Page<Author>>, AppError> {
    Ok(Json(service.list(&query).await?))
}

async fn get_author(
    State(service): State<Arc<AuthorService>>,
    Path(id): Path<String>,
) -> Result<Json<Author>, AppError> {
    Ok(Json(service.get_by_id(&id).await?))
}

async fn update_author(
    State(service): State<Arc<AuthorService>>,
    Path(id): Path<String>,
    Validated(input): Validated<UpdateAuthor>,
) -> Result<Json<Author>, AppError> {
    Ok(Json(service.update(&id, input).await?))
}

async fn delete_author(
    State(service): State<Arc<AuthorService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
