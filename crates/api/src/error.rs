use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use persistence::repositories::LedgerError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Insufficient budget: {0}")]
    InsufficientBudget(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Gone(msg) => (StatusCode::GONE, "gone", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::InsufficientBalance(msg) => {
                (StatusCode::BAD_REQUEST, "insufficient_balance", msg.clone())
            }
            ApiError::InsufficientBudget(msg) => {
                (StatusCode::BAD_REQUEST, "insufficient_budget", msg.clone())
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } => {
                ApiError::InsufficientBalance("Balance is less than the requested amount".into())
            }
            LedgerError::InsufficientBudget { remain, needed, .. } => ApiError::InsufficientBudget(
                format!("Remaining points ({remain}) is less than requested ({needed})"),
            ),
            LedgerError::MissingRow => ApiError::NotFound("Referenced resource not found".into()),
            LedgerError::Db(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.clone().map(|m| m.to_string()).unwrap_or_default()
                    )
                })
            })
            .collect();

        ApiError::Validation(messages.join(", "))
    }
}

impl From<shared::pagination::PageError> for ApiError {
    fn from(err: shared::pagination::PageError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_api_error_statuses() {
        let cases = [
            (
                ApiError::Unauthorized("t".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::Forbidden("t".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("t".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("t".into()), StatusCode::CONFLICT),
            (ApiError::Gone("t".into()), StatusCode::GONE),
            (ApiError::Validation("t".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::InsufficientBalance("t".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::InsufficientBudget("t".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Internal("t".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        match error {
            ApiError::NotFound(msg) => assert_eq!(msg, "Resource not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_from_ledger_insufficient_balance() {
        let error: ApiError = LedgerError::InsufficientBalance { user_id: 1 }.into();
        assert!(matches!(error, ApiError::InsufficientBalance(_)));
    }

    #[test]
    fn test_from_ledger_insufficient_budget() {
        let error: ApiError = LedgerError::InsufficientBudget {
            event_id: 1,
            remain: 100,
            needed: 120,
        }
        .into();
        match error {
            ApiError::InsufficientBudget(msg) => {
                assert!(msg.contains("100"));
                assert!(msg.contains("120"));
            }
            _ => panic!("Expected InsufficientBudget error"),
        }
    }

    #[test]
    fn test_from_page_error() {
        let error: ApiError = shared::pagination::PageError::InvalidLimit.into();
        assert!(matches!(error, ApiError::Validation(_)));
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Gone("Event has ended".to_string())),
            "Gone: Event has ended"
        );
        assert_eq!(
            format!("{}", ApiError::Validation("test".to_string())),
            "Validation error: test"
        );
    }
}
