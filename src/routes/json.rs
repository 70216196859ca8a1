//! JSON request bodies that report type mismatches per field.
//!
//! `web::Json<T>` rejects `{"completed": "yes"}` as one opaque parse error.
//! [`JsonBody`] first reads the body as a `serde_json::Value` (so malformed
//! JSON still goes through the app's `JsonConfig` handler), then decodes the
//! object while tracking the path, and reports a mismatch under the JSON key
//! that caused it.

use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;

/// A request body decoded from a JSON object.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T> JsonBody<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned + 'static> FromRequest for JsonBody<T> {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let value = web::Json::<Value>::from_request(req, payload);
        Box::pin(async move {
            let value = value.await?.into_inner();
            decode_object(value).map(JsonBody).map_err(ActixError::from)
        })
    }
}

/// Decodes a JSON object into `T`.
///
/// Anything but an object is a `BadRequest`; a field of the wrong type is a
/// `Validation` error keyed by that field's JSON name.
pub fn decode_object<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    if !value.is_object() {
        return Err(AppError::BadRequest(
            "Invalid request body: expected a JSON object".into(),
        ));
    }

    serde_path_to_error::deserialize(value).map_err(|err| {
        let field = err.path().to_string();
        let message = type_mismatch_message(&err.inner().to_string());
        if field.is_empty() || field == "." {
            AppError::BadRequest(format!("Invalid request body: {}", message))
        } else {
            AppError::invalid_field(field, message)
        }
    })
}

/// "invalid type: string \"yes\", expected a boolean" -> "Expected a boolean".
fn type_mismatch_message(detail: &str) -> String {
    match detail.rsplit_once(", expected ") {
        Some((_, expected)) => format!("Expected {}", expected),
        None => detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateTaskRequest;
    use serde_json::json;

    fn field_errors(error: AppError) -> crate::error::FieldErrors {
        match error {
            AppError::Validation(errors) => errors,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_object_accepts_valid_body() {
        let request: CreateTaskRequest =
            decode_object(json!({ "title": "Buy milk", "completed": true })).unwrap();
        assert_eq!(request.title, "Buy milk");
        assert_eq!(request.completed, Some(true));
    }

    #[test]
    fn test_wrong_types_are_keyed_by_json_field() {
        let errors = field_errors(
            decode_object::<CreateTaskRequest>(json!({ "title": "x", "completed": "yes" }))
                .unwrap_err(),
        );
        assert_eq!(errors["completed"], vec!["Expected a boolean".to_string()]);

        let errors =
            field_errors(decode_object::<CreateTaskRequest>(json!({ "title": 5 })).unwrap_err());
        assert_eq!(errors["title"], vec!["Expected a string".to_string()]);

        let errors = field_errors(
            decode_object::<CreateTaskRequest>(json!({ "title": "x", "dueDate": 20250921 }))
                .unwrap_err(),
        );
        assert!(errors.contains_key("dueDate"));
    }

    #[test]
    fn test_non_object_bodies_are_bad_requests() {
        for body in [json!([1, 2]), json!("title"), json!(null)] {
            match decode_object::<CreateTaskRequest>(body) {
                Err(AppError::BadRequest(_)) => {}
                other => panic!("expected BadRequest, got {:?}", other.map(|_| ())),
            }
        }
    }
}
