use folio_db::{CollectionSchema, FieldRule};
use folio_http::validation::rules;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::utils::{check, parse_positive, PageRequest};

pub static AUTHOR_SCHEMA: CollectionSchema = CollectionSchema {
    table: "author",
    fields: &[
        FieldRule::required("first_name", "firstName"),
        FieldRule::required("last_name", "lastName"),
        FieldRule::optional("bio", "bio"),
        FieldRule::optional("birth_date", "birthDate"),
    ],
    unique: &[],
};

/// Author as stored.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorRow {
    pub doc_id: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub birth_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Author as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.doc_id,
            first_name: row.first_name,
            last_name: row.last_name,
            bio: row.bio,
            birth_date: row.birth_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Columns written on create and update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<String>,
}

/// Request model for creating an author.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateAuthor {
    #[validate(
        required(message = "firstName must be a string"),
        length(min = 1, message = "firstName should not be empty")
    )]
    pub first_name: Option<String>,
    #[validate(
        required(message = "lastName must be a string"),
        length(min = 1, message = "lastName should not be empty")
    )]
    pub last_name: Option<String>,
    pub bio: Option<String>,
    #[validate(custom(function = "validate_birth_date"))]
    pub birth_date: Option<String>,
}

impl From<CreateAuthor> for AuthorFields {
    fn from(input: CreateAuthor) -> Self {
        Self {
            first_name: input.first_name,
            last_name: input.last_name,
            bio: input.bio,
            birth_date: input.birth_date,
        }
    }
}

/// Request model for a partial author update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateAuthor {
    #[validate(length(min = 1, message = "firstName should not be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "lastName should not be empty"))]
    pub last_name: Option<String>,
    pub bio: Option<String>,
    #[validate(custom(function = "validate_birth_date"))]
    pub birth_date: Option<String>,
}

impl From<UpdateAuthor> for AuthorFields {
    fn from(input: UpdateAuthor) -> Self {
        Self {
            first_name: input.first_name,
            last_name: input.last_name,
            bio: input.bio,
            birth_date: input.birth_date,
        }
    }
}

/// Query string of `GET /authors`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AuthorQuery {
    #[validate(custom(function = "crate::utils::validate_page"))]
    pub page: Option<String>,
    #[validate(custom(function = "crate::utils::validate_limit"))]
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl AuthorQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            parse_positive(self.page.as_deref()),
            parse_positive(self.limit.as_deref()),
        )
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

fn validate_birth_date(value: &str) -> Result<(), ValidationError> {
    check(
        rules::is_iso_date(value),
        "birthDate must be a valid ISO 8601 date string",
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
    fn create_requires_both_names() {
        let input: CreateAuthor = serde_json::from_str(r#"{"lastName":"Test"}"#).unwrap();
        assert_eq!(messages(input.validate()), vec!["firstName must be a string"]);

        let input: CreateAuthor =
            serde_json::from_str(r#"{"firstName":"","lastName":""}"#).unwrap();
        assert_eq!(
            messages(input.validate()),
            vec!["firstName should not be empty", "lastName should not be empty"]
        );
    }

    #[test]
    fn create_checks_birth_date() {
        let input: CreateAuthor = serde_json::from_str(
            r#"{"firstName":"Jane","lastName":"Austen","birthDate":"16 Dec 1775"}"#,
        )
        .unwrap();
        assert_eq!(
            messages(input.validate()),
            vec!["birthDate must be a valid ISO 8601 date string"]
        );
    }

    #[test]
    fn update_accepts_partial_bodies() {
        let input: UpdateAuthor = serde_json::from_str(r#"{"bio":"Novelist"}"#).unwrap();
        assert!(input.validate().is_ok());

        let fields = AuthorFields::from(input);
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["bio"], "Novelist");
        assert!(json["first_name"].is_null());
    }

    #[test]
    fn unknown_fields_are_refused() {
        let parsed = serde_json::from_str::<CreateAuthor>(
            r#"{"firstName":"Jane","lastName":"Austen","nickname":"Jenny"}"#,
        );
        assert!(parsed.unwrap_err().to_string().contains("unknown field `nickname`"));
    }

    #[test]
    fn query_defaults_and_validation() {
        let query = AuthorQuery::default();
        assert_eq!(query.page_request(), PageRequest { page: 1, limit: 10 });

        let query = AuthorQuery {
            page: Some("0".to_string()),
            limit: Some("abc".to_string()),
            search: Some("  ".to_string()),
        };
        assert_eq!(
            messages(query.validate()),
            vec!["limit must be a positive integer", "page must be a positive integer"]
        );
        assert_eq!(query.search(), None);
    }

    #[test]
    fn rows_map_to_api_shape() {
        let author = Author::from(AuthorRow {
            doc_id: "507f1f77bcf86cd799439011".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Austen".to_string(),
            bio: None,
            birth_date: Some("1775-12-16".to_string()),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        });

        let json = serde_json::to_value(&author).unwrap();
        assert_eq!(json["id"], "507f1f77bcf86cd799439011");
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["birthDate"], "1775-12-16");
        assert!(json.get("bio").is_none());
    }
}
