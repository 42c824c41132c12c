use folio_db::{CollectionSchema, FieldRule, UniqueIndex};
use folio_http::validation::rules;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::modules::authors::models::Author;
use crate::utils::{check, parse_positive, PageRequest};

pub static BOOK_SCHEMA: CollectionSchema = CollectionSchema {
    table: "book",
    fields: &[
        FieldRule::required("title", "title"),
        FieldRule::required("isbn", "isbn"),
        FieldRule::optional("published_date", "publishedDate"),
        FieldRule::optional("genre", "genre"),
        FieldRule::required("author_id", "authorId"),
    ],
    unique: &[UniqueIndex {
        name: "book_isbn_unique",
        column: "isbn",
        path: "isbn",
    }],
};

/// Book as stored.
#[derive(Debug, Clone, Deserialize)]
pub struct BookRow {
    pub doc_id: String,
    pub title: String,
    pub isbn: String,
    pub published_date: Option<String>,
    pub genre: Option<String>,
    pub author_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Book as returned by the API, with its author expanded. `author` is null
/// when the referenced author no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub author: Option<Author>,
    pub created_at: String,
    pub updated_at: String,
}

impl Book {
    pub fn from_row(row: BookRow, author: Option<Author>) -> Self {
        Self {
            id: row.doc_id,
            title: row.title,
            isbn: row.isbn,
            published_date: row.published_date,
            genre: row.genre,
            author,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookFields {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub published_date: Option<String>,
    pub genre: Option<String>,
    pub author_id: Option<String>,
}

/// Request model for creating a book.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(required(message = "title must be a string"))]
    pub title: Option<String>,
    #[validate(
        required(message = "isbn must be an ISBN"),
        custom(function = "validate_isbn")
    )]
    pub isbn: Option<String>,
    #[validate(custom(function = "validate_published_date"))]
    pub published_date: Option<String>,
    pub genre: Option<String>,
    #[validate(
        required(message = "authorId must be a valid identifier"),
        custom(function = "validate_author_id")
    )]
    pub author_id: Option<String>,
}

impl From<CreateBook> for BookFields {
    fn from(input: CreateBook) -> Self {
        Self {
            title: input.title,
            isbn: input.isbn,
            published_date: input.published_date,
            genre: input.genre,
            author_id: input.author_id.map(|id| id.to_ascii_lowercase()),
        }
    }
}

/// Request model for a partial book update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateBook {
    pub title: Option<String>,
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: Option<String>,
    #[validate(custom(function = "validate_published_date"))]
    pub published_date: Option<String>,
    pub genre: Option<String>,
    #[validate(custom(function = "validate_author_id"))]
    pub author_id: Option<String>,
}

impl From<UpdateBook> for BookFields {
    fn from(input: UpdateBook) -> Self {
        Self {
            title: input.title,
            isbn: input.isbn,
            published_date: input.published_date,
            genre: input.genre,
            author_id: input.author_id.map(|id| id.to_ascii_lowercase()),
        }
    }
}

/// Query string of `GET /books`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BookQuery {
    #[validate(custom(function = "crate::utils::validate_page"))]
    pub page: Option<String>,
    #[validate(custom(function = "crate::utils::validate_limit"))]
    pub limit: Option<String>,
    pub search: Option<String>,
    #[validate(custom(function = "validate_author_id"))]
    pub author_id: Option<String>,
}

impl BookQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            parse_positive(self.page.as_deref()),
            parse_positive(self.limit.as_deref()),
        )
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn author_id(&self) -> Option<String> {
        self.author_id.as_deref().map(str::to_ascii_lowercase)
    }
}

fn validate_isbn(value: &str) -> Result<(), ValidationError> {
    check(rules::is_isbn(value), "isbn must be an ISBN")
}

fn validate_published_date(value: &str) -> Result<(), ValidationError> {
    check(
        rules::is_iso_date(value),
        "publishedDate must be a valid ISO 8601 date string",
    )
}

fn validate_author_id(value: &str) -> Result<(), ValidationError> {
    check(
        rules::is_record_key(value),
        "authorId must be a valid identifier",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(result: Result<(), validator::ValidationErrors>) -> Vec<String> {
        let mut messages: Vec<String> = result
            .unwrap_err()
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .filter_map(|error| error.message.as_ref().map(|m| m.to_string()))
            .collect();
        messages.sort();
        messages
    }

    #[test]
    fn create_accepts_a_complete_book() {
        let input: CreateBook = serde_json::from_str(
            r#"{"title":"Pride and Prejudice","isbn":"978-0-14-143951-8","publishedDate":"1813-01-28","genre":"Romance","authorId":"507f1f77bcf86cd799439011"}"#,
        )
        .unwrap();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn create_reports_every_broken_rule() {
        let input: CreateBook = serde_json::from_str(
            r#"{"isbn":"12345","publishedDate":"someday","authorId":"nope"}"#,
        )
        .unwrap();
        assert_eq!(
            messages(input.validate()),
            vec![
                "authorId must be a valid identifier",
                "isbn must be an ISBN",
                "publishedDate must be a valid ISO 8601 date string",
                "title must be a string",
            ]
        );
    }

    #[test]
    fn update_validates_only_supplied_fields() {
        let input: UpdateBook = serde_json::from_str(r#"{"genre":"Satire"}"#).unwrap();
        assert!(input.validate().is_ok());

        let input: UpdateBook = serde_json::from_str(r#"{"authorId":"123"}"#).unwrap();
        assert_eq!(
            messages(input.validate()),
            vec!["authorId must be a valid identifier"]
        );
    }

    #[test]
    fn author_ids_are_normalised() {
        let input: UpdateBook =
            serde_json::from_str(r#"{"authorId":"507F1F77BCF86CD799439011"}"#).unwrap();
        let fields = BookFields::from(input);
        assert_eq!(fields.author_id.as_deref(), Some("507f1f77bcf86cd799439011"));
    }

    #[test]
    fn query_checks_author_filter() {
        let query = BookQuery {
            author_id: Some("xyz".to_string()),
            ..BookQuery::default()
        };
        assert_eq!(
            messages(query.validate()),
            vec!["authorId must be a valid identifier"]
        );
    }

    #[test]
    fn dangling_author_serializes_as_null() {
        let book = Book::from_row(
            BookRow {
                doc_id: "507f1f77bcf86cd799439012".to_string(),
                title: "Emma".to_string(),
                isbn: "9780141439587".to_string(),
                published_date: None,
                genre: None,
                author_id: "507f1f77bcf86cd799439011".to_string(),
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
                updated_at: "2024-01-01T00:00:00.000Z".to_string(),
            },
            None,
        );

        let json = serde_json::to_value(&book).unwrap();
        assert!(json["author"].is_null());
        assert!(json.get("author").is_some());
        assert!(json.get("authorId").is_none());
    }
}
