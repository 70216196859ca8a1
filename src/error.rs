//!
//! # Custom Error Handling
//!
//! This module defines the `AppError` type used by every handler and store call.
//! Each variant is one kind of failure a client can observe, and `AppError`
//! implements `actix_web::error::ResponseError` so a handler can simply return
//! `Result<_, AppError>` and let `?` do the rest.
//!
//! Two body shapes are produced:
//!
//! * validation failures: `{"error": {"<field>": ["message", ...]}}`
//! * everything else: `{"error": "message"}`
//!
//! Server-side failures (`InternalServerError`, `DatabaseError`) are logged with
//! their detail and answered with a generic message.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use validator::{ValidationError, ValidationErrors};

/// `field -> [message]`, sorted by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Message returned to clients for every server-side failure.
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// Represents all errors a request can end with.
#[derive(Debug)]
pub enum AppError {
    /// Missing, invalid or expired session, or rejected credentials (HTTP 401).
    Unauthorized(String),
    /// Body could not be understood at all (HTTP 400).
    BadRequest(String),
    /// Field-level validation failures, keyed by field name (HTTP 400).
    Validation(FieldErrors),
    /// A unique user attribute is already taken (HTTP 400).
    Conflict(String),
    /// Resource absent or not owned by the caller; the two are not told apart (HTTP 404).
    NotFound(String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure reported by the store (HTTP 500).
    DatabaseError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Validation(errors) => write!(f, "Validation Error: {:?}", errors),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Validation(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => json!({ "error": errors }),
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg) => json!({ "error": msg }),
            AppError::InternalServerError(detail) | AppError::DatabaseError(detail) => {
                log::error!("request failed: {}", detail);
                json!({ "error": SERVER_ERROR_MESSAGE })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl AppError {
    /// A validation failure on a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::from([(field.into(), vec![message.into()])]))
    }
}

/// Flattens `ValidationErrors` into [`FieldErrors`].
pub fn field_messages(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            (
                field.to_string(),
                errs.iter().map(describe).collect::<Vec<_>>(),
            )
        })
        .collect()
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match &*error.code {
        "email" => "Invalid email".to_string(),
        "length" => match error.params.get("min") {
            Some(min) => format!("Must be at least {} characters", min),
            None => "Invalid length".to_string(),
        },
        code => format!("Invalid value ({})", code),
    }
}

/// `RowNotFound` becomes `NotFound`; anything else the store reports is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        AppError::Validation(field_messages(&errors))
    }
}

/// JWT failures while *issuing* a token are server faults; verification never
/// goes through here because it yields `Option`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::InternalServerError(format!("Token error: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(error: actix_web::error::BlockingError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
