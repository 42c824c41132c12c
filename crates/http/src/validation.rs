//! Request validation extractors.
//!
//! [`Validated`] and [`ValidatedQuery`] deserialize the body or query string
//! and run `validator::Validate` on it. Every failure becomes an
//! [`AppError::Validation`] carrying one message per offending field, sorted
//! by field, or an [`AppError::BadRequest`] for input that is not JSON at all.

use std::sync::OnceLock;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use folio_db::RecordKey;
use regex::Regex;
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// JSON body that passed `validator::Validate`.
pub struct Validated<T>(pub T);

impl<T, S> FromRequest<S> for Validated<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        value.validate().map_err(validation_failure)?;
        Ok(Validated(value))
    }
}

/// Query string that passed `validator::Validate`.
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(query_rejection)?;

        value.validate().map_err(validation_failure)?;
        Ok(ValidatedQuery(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(err) => match deserialize_message(&err.body_text()) {
            Some(message) => AppError::validation([message]),
            None => AppError::bad_request(err.body_text()),
        },
        other => AppError::bad_request(other.body_text()),
    }
}

fn query_rejection(rejection: QueryRejection) -> AppError {
    match deserialize_message(&rejection.body_text()) {
        Some(message) => AppError::validation([message]),
        None => AppError::bad_request(rejection.body_text()),
    }
}

/// Rephrase a serde failure naming a field, e.g. ``unknown field `x` ``.
fn deserialize_message(text: &str) -> Option<String> {
    if let Some(captures) = unknown_field().captures(text) {
        return Some(format!("property {} should not exist", &captures[1]));
    }
    invalid_type()
        .captures(text)
        .map(|captures| format!("{} must be a string", &captures[1]))
}

fn validation_failure(errors: ValidationErrors) -> AppError {
    let mut entries: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            failures.iter().map(move |failure| {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (field.to_string(), message)
            })
        })
        .collect();
    entries.sort();

    AppError::validation(entries.into_iter().map(|(_, message)| message))
}

fn unknown_field() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"unknown field `([^`]+)`").expect("unknown field pattern is valid"))
}

// "Failed to deserialize the JSON body into the target type: title: invalid type: integer `5`, ..."
fn invalid_type() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\w+): invalid type").expect("invalid type pattern is valid")
    })
}

/// Field rules shared by request DTOs.
pub mod rules {
    use super::*;

    /// ISBN-10 or ISBN-13 with a valid check digit. Hyphens and spaces are
    /// ignored.
    pub fn is_isbn(value: &str) -> bool {
        let compact: Vec<char> = value.chars().filter(|c| *c != '-' && *c != ' ').collect();
        match compact.len() {
            10 => isbn10_checksum(&compact),
            13 => isbn13_checksum(&compact),
            _ => false,
        }
    }

    fn isbn10_checksum(chars: &[char]) -> bool {
        let mut sum = 0;
        for (index, ch) in chars.iter().enumerate() {
            let digit = match (index, ch) {
                (9, 'X') | (9, 'x') => 10,
                (_, c) => match c.to_digit(10) {
                    Some(d) => d,
                    None => return false,
                },
            };
            sum += digit * (10 - index as u32);
        }
        sum % 11 == 0
    }

    fn isbn13_checksum(chars: &[char]) -> bool {
        let mut sum = 0;
        for (index, ch) in chars.iter().enumerate() {
            let Some(digit) = ch.to_digit(10) else {
                return false;
            };
            sum += if index % 2 == 0 { digit } else { digit * 3 };
        }
        sum % 10 == 0
    }

    /// Calendar date (`YYYY-MM-DD`) or RFC 3339 timestamp.
    pub fn is_iso_date(value: &str) -> bool {
        Date::parse(value, format_description!("[year]-[month]-[day]")).is_ok()
            || OffsetDateTime::parse(value, &Rfc3339).is_ok()
    }

    pub fn is_record_key(value: &str) -> bool {
        RecordKey::is_well_formed(value)
    }

    pub fn is_positive_integer(value: &str) -> bool {
        value.parse::<u64>().map(|n| n > 0).unwrap_or(false)
    }
}
