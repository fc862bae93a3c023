use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation error: {message}")]
    InvalidFields { message: String, details: Value },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(sqlx::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    /// A 400 that carries structured details back to the client.
    pub fn rejected(message: impl Into<String>, details: Value) -> Self {
        AppError::InvalidFields {
            message: message.into(),
            details,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidFields { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::InvalidFields { .. } => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to show a client. Internal failures are generic.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ExternalServiceError(msg)
            | AppError::InvalidFields { message: msg, .. } => msg.clone(),
            AppError::InternalServerError(_) => "Internal server error".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidFields { message: msg, .. } => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let violation = err.as_database_error().and_then(|db| {
            let code = db.code()?;
            let constraint = db.constraint().unwrap_or_default().to_string();
            match &*code {
                UNIQUE_VIOLATION => Some(conflict_message(&constraint)),
                FOREIGN_KEY_VIOLATION => Some(reference_message(&constraint)),
                _ => None,
            }
        });

        match violation {
            Some(message) => AppError::Conflict(message),
            None => AppError::DatabaseError(err),
        }
    }
}

fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "A user with this email already exists".to_string(),
        "guests_event_id_email_key" => {
            "A guest with this email already exists for this event".to_string()
        }
        "ticket_types_event_id_name_key" => {
            "A ticket type with this name already exists for this event".to_string()
        }
        "discount_codes_code_key" => "A discount code with this code already exists".to_string(),
        "" => "Duplicate value violates a unique constraint".to_string(),
        other => format!("Duplicate value violates '{}'", other),
    }
}

fn reference_message(constraint: &str) -> String {
    match constraint {
        "order_items_ticket_type_id_fkey" | "tickets_ticket_type_id_fkey" => {
            "Cannot delete a ticket type that has orders".to_string()
        }
        _ => "The record is referenced by other records".to_string(),
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = serde_json::Map::new();
        collect_field_errors(&errors, "", &mut details);

        AppError::InvalidFields {
            message: "The provided input is invalid".to_string(),
            details: Value::Object(details),
        }
    }
}

/// Flattens nested validation errors into `field`, `parent.field` or
/// `list[0].field` keys. Struct-level errors land under `non_field_errors`.
fn collect_field_errors(
    errors: &validator::ValidationErrors,
    prefix: &str,
    out: &mut serde_json::Map<String, Value>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let field = if field.as_ref() == "__all__" {
            "non_field_errors"
        } else {
            field.as_ref()
        };
        let key = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                out.insert(key, json!(messages));
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(inner, &key, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(inner, &format!("{}[{}]", key, index), out);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = self.public_message();
        let details = match self {
            AppError::InvalidFields { details, .. } => Some(details),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Enter a valid email address"))]
        email: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ExternalServiceError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_validation_errors_carry_field_details() {
        let errors = Signup {
            email: "not-an-email".into(),
        }
        .validate()
        .unwrap_err();

        match AppError::from(errors) {
            AppError::InvalidFields { details, .. } => {
                assert_eq!(details["email"][0], "Enter a valid email address");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[derive(Validate)]
    struct Batch {
        #[validate(nested)]
        people: Vec<Signup>,
    }

    #[test]
    fn test_nested_errors_are_keyed_by_path() {
        let errors = Batch {
            people: vec![
                Signup {
                    email: "ok@example.com".into(),
                },
                Signup {
                    email: "broken".into(),
                },
            ],
        }
        .validate()
        .unwrap_err();

        match AppError::from(errors) {
            AppError::InvalidFields { details, .. } => {
                assert!(details.get("people[1].email").is_some());
                assert!(details.get("people[0].email").is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_database_sqlx_error_is_not_a_conflict() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_ticket_type_references_explain_the_conflict() {
        assert_eq!(
            reference_message("order_items_ticket_type_id_fkey"),
            "Cannot delete a ticket type that has orders"
        );
        assert_eq!(
            reference_message("tickets_ticket_type_id_fkey"),
            "Cannot delete a ticket type that has orders"
        );
        assert_eq!(
            reference_message("check_ins_guest_id_fkey"),
            "The record is referenced by other records"
        );
    }

    #[test]
    fn test_internal_errors_hide_their_message() {
        let err = AppError::InternalServerError("secret detail".into());
        assert_eq!(err.public_message(), "Internal server error");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
