use std::sync::LazyLock;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

/// `{"message": ...}` with the given status, the shape every mutating route answers with.
pub fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(Message {
            message: text.to_string(),
        }),
    )
        .into_response()
}

pub fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if EMAIL.is_match(email.trim()) {
        Ok(())
    } else {
        Err(AppError::bad_request("Invalid email address"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert_eq!(require(Some(" ward-a "), "ward").unwrap(), "ward-a");
        assert!(require(Some("   "), "ward").is_err());
        assert!(require(None, "ward").is_err());
    }

    #[test]
    fn test_require_names_field() {
        match require(None, "bed_id") {
            Err(AppError::BadRequest(message)) => assert_eq!(message, "bed_id is required"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("admin@hospital.lk").is_ok());
        assert!(validate_email(" nurse.b@test.com ").is_ok());
        assert!(validate_email("nurse").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@test.com").is_err());
    }
}
