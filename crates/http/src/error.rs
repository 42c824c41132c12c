//! Error handling for the folio HTTP layer.
//!
//! Every failure raised while serving a request ends up as an [`AppError`],
//! and [`AppError::normalize`] maps it to exactly one [`ErrorBody`]. The body
//! is rendered without the request path; [`attach_request_path`] fills it in
//! on the way out.

use std::sync::OnceLock;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use folio_db::{clock, DuplicateField, FaultKind, FieldFault, StoreError};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// One `{field, message}` entry of an error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Standard error response format for all HTTP errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    pub timestamp: String,
    pub path: String,
}

impl ErrorBody {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            error: None,
            errors: None,
            timestamp: clock::now_iso8601(),
            path: String::new(),
        }
    }

    fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = Some(errors);
        self
    }

    fn with_phrase(mut self, phrase: Option<&'static str>) -> Self {
        self.error = phrase;
        self
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("unprocessable entity: {message}")]
    UnprocessableEntity { message: String },

    /// Per-field messages from request validation, e.g. `isbn must be an ISBN`.
    #[error("request validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::UnprocessableEntity {
            message: message.into(),
        }
    }

    /// Create a validation error from per-field messages
    pub fn validation<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation(messages.into_iter().map(Into::into).collect())
    }

    /// Map this error to its wire envelope. Unanticipated failures are logged
    /// here with full detail; the client only sees a fixed message.
    pub fn normalize(&self) -> ErrorBody {
        match self {
            AppError::Store(StoreError::Validation { faults }) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "Validation failed")
                    .with_errors(faults.iter().map(fault_entry).collect())
            }
            AppError::Store(StoreError::Cast { .. }) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "Invalid ID format")
            }
            AppError::Store(StoreError::DuplicateKey { fields, raw }) => {
                ErrorBody::new(StatusCode::CONFLICT, "Duplicate key error")
                    .with_errors(duplicate_entries(fields, raw))
            }
            AppError::Validation(messages) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "Validation error").with_errors(
                    messages
                        .iter()
                        .map(|message| FieldError::new(message_field(message), message.clone()))
                        .collect(),
                )
            }
            AppError::NotFound { message } => declared(StatusCode::NOT_FOUND, message),
            AppError::BadRequest { message } => declared(StatusCode::BAD_REQUEST, message),
            AppError::Conflict { message } => declared(StatusCode::CONFLICT, message),
            AppError::UnprocessableEntity { message } => {
                declared(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            AppError::Store(StoreError::Other(err)) | AppError::Internal(err) => {
                tracing::error!(error = ?err, "unhandled error while serving request");
                ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.normalize().into_response()
    }
}

fn declared(status: StatusCode, message: &str) -> ErrorBody {
    ErrorBody::new(status, message).with_phrase(status_phrase(status))
}

fn status_phrase(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::NOT_FOUND => Some("Not Found"),
        StatusCode::BAD_REQUEST => Some("Bad Request"),
        StatusCode::CONFLICT => Some("Conflict"),
        StatusCode::UNPROCESSABLE_ENTITY => Some("Unprocessable Entity"),
        _ => None,
    }
}

fn fault_entry(fault: &FieldFault) -> FieldError {
    let label = field_label(&fault.path);
    let message = match fault.kind {
        FaultKind::Required => format!("{label} is required."),
        FaultKind::MinLength => format!("{label} is too short."),
        FaultKind::MaxLength => format!("{label} is too long."),
        FaultKind::Enum => format!("{label} has an invalid value."),
        FaultKind::Unique => format!("{label} must be unique."),
        FaultKind::Other => {
            let stripped = path_prefix().replace(&fault.message, "");
            format!("{}.", stripped.trim_end_matches('.').trim())
        }
    };
    FieldError::new(fault.path.clone(), message)
}

fn duplicate_entries(fields: &[DuplicateField], raw: &str) -> Vec<FieldError> {
    if !fields.is_empty() {
        return fields
            .iter()
            .map(|field| {
                let label = field_label(&field.path);
                let message = match &field.value {
                    Some(value) => format!("{label} must be unique. Duplicate value: {value}."),
                    None => format!("{label} must be unique."),
                };
                FieldError::new(field.path.clone(), message)
            })
            .collect();
    }

    if let Some(captures) = duplicate_fragment().captures(raw) {
        let field = &captures[1];
        let value = &captures[2];
        return vec![FieldError::new(
            field,
            format!("{} must be unique. Duplicate value: {value}.", field_label(field)),
        )];
    }

    vec![FieldError::new(
        "general",
        "Duplicate value violates a unique constraint.",
    )]
}

/// `birthDate` becomes `Birth Date`.
pub fn field_label(path: &str) -> String {
    let mut label = String::with_capacity(path.len() + 4);
    for (index, ch) in path.chars().enumerate() {
        if index == 0 {
            label.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            label.push(' ');
            label.push(ch);
        } else {
            label.push(ch);
        }
    }
    label.trim().to_string()
}

/// Field a validation message refers to, or `general`.
fn message_field(message: &str) -> String {
    leading_field()
        .captures(message)
        .or_else(|| property_field().captures(message))
        .map(|captures| captures[1].to_string())
        .unwrap_or_else(|| "general".to_string())
}

fn path_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^Path `[^`]+` ").expect("path prefix pattern is valid"))
}

fn duplicate_fragment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\{\s*(\w+)\s*:\s*"?([^"}]+)"?\s*\}"#).expect("duplicate fragment pattern is valid")
    })
}

fn leading_field() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_]\w*)\s+(must|should) be").expect("field pattern is valid")
    })
}

fn property_field() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^property\s+(\w+)\s+should be").expect("property pattern is valid")
    })
}

/// Fill the request path into error envelopes produced further down the stack.
pub async fn attach_request_path(request: Request, next: Next) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    match response.extensions().get::<ErrorBody>().cloned() {
        Some(mut body) => {
            body.path = path;
            body.into_response()
        }
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn store_validation_uses_canned_phrasing() {
        let err = AppError::from(StoreError::Validation {
            faults: vec![
                FieldFault::new("firstName", FaultKind::Required, "is required."),
                FieldFault::new("bio", FaultKind::MaxLength, "is longer than allowed."),
            ],
        });

        let body = err.normalize();
        assert_eq!(body.status_code, 400);
        assert_eq!(body.message, "Validation failed");
        assert_eq!(
            body.errors.unwrap(),
            vec![
                FieldError::new("firstName", "First Name is required."),
                FieldError::new("bio", "Bio is too long."),
            ]
        );
        assert!(body.error.is_none());
    }

    #[test]
    fn other_faults_strip_path_prefix_and_repunctuate() {
        let err = AppError::from(StoreError::Validation {
            faults: vec![FieldFault::new(
                "publishedDate",
                FaultKind::Other,
                "must conform to a date.",
            )],
        });

        let errors = err.normalize().errors.unwrap();
        assert_eq!(errors[0].field, "publishedDate");
        assert_eq!(errors[0].message, "must conform to a date.");
    }

    #[test]
    fn cast_failures_have_no_field_list() {
        let body = AppError::from(StoreError::Cast {
            value: "nope".to_string(),
        })
        .normalize();

        assert_eq!(body.status_code, 400);
        assert_eq!(body.message, "Invalid ID format");
        assert!(body.errors.is_none());
    }

    #[test]
    fn duplicate_key_with_structured_fields() {
        let body = AppError::from(StoreError::DuplicateKey {
            fields: vec![DuplicateField {
                path: "isbn".to_string(),
                value: Some("9780141439518".to_string()),
            }],
            raw: String::new(),
        })
        .normalize();

        assert_eq!(body.status_code, 409);
        assert_eq!(body.message, "Duplicate key error");
        assert_eq!(
            body.errors.unwrap(),
            vec![FieldError::new(
                "isbn",
                "Isbn must be unique. Duplicate value: 9780141439518."
            )]
        );
    }

    #[test]
    fn duplicate_key_falls_back_to_raw_text() {
        let parsed = AppError::from(StoreError::DuplicateKey {
            fields: vec![],
            raw: r#"index: isbn_1 dup key: { isbn: "123" }"#.to_string(),
        })
        .normalize();
        assert_eq!(
            parsed.errors.unwrap(),
            vec![FieldError::new("isbn", "Isbn must be unique. Duplicate value: 123.")]
        );

        let generic = AppError::from(StoreError::DuplicateKey {
            fields: vec![],
            raw: "unique index violated".to_string(),
        })
        .normalize();
        assert_eq!(
            generic.errors.unwrap(),
            vec![FieldError::new(
                "general",
                "Duplicate value violates a unique constraint."
            )]
        );
    }

    #[test]
    fn validation_messages_are_reparsed_into_fields() {
        let body = AppError::validation([
            "firstName should not be empty",
            "isbn must be an ISBN",
            "property nickname should not exist",
            "property nickname should be a string",
            "something odd happened",
        ])
        .normalize();

        assert_eq!(body.message, "Validation error");
        let fields: Vec<String> = body.errors.unwrap().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["firstName", "isbn", "general", "nickname", "general"]
        );
    }

    #[test]
    fn declared_failures_carry_status_phrase() {
        let cases = [
            (AppError::not_found("Author not found"), 404, "Not Found"),
            (AppError::bad_request("bad"), 400, "Bad Request"),
            (AppError::conflict("taken"), 409, "Conflict"),
            (AppError::unprocessable("nope"), 422, "Unprocessable Entity"),
        ];

        for (err, status, phrase) in cases {
            let body = err.normalize();
            assert_eq!(body.status_code, status);
            assert_eq!(body.error, Some(phrase));
            assert!(body.errors.is_none());
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let response =
            AppError::Internal(anyhow::anyhow!("connection reset by peer")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");
        assert_eq!(json["statusCode"], 500);
        assert!(json.get("error").is_none());
        assert!(!json.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn envelope_is_camel_case_with_timestamp() {
        let json = body_json(AppError::not_found("Book not found").into_response()).await;

        assert_eq!(json["statusCode"], 404);
        assert_eq!(json["message"], "Book not found");
        assert_eq!(json["error"], "Not Found");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn labels_split_camel_case() {
        assert_eq!(field_label("firstName"), "First Name");
        assert_eq!(field_label("isbn"), "Isbn");
        assert_eq!(field_label("publishedDate"), "Published Date");
    }
}
