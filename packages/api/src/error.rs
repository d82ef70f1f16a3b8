//! # Error mapping
//!
//! Every handler returns `Result<_, ApiError>`. The [`IntoResponse`] impl turns
//! an error into the `{success: false, message}` envelope with a status code:
//!
//! | Source | Status |
//! |--------|--------|
//! | unique violation `23505` | 409 |
//! | foreign key violation `23503` on insert or update | 400 |
//! | foreign key violation `23503` on delete | 409 |
//! | invalid text representation `22P02` | 400 |
//! | check violation `23514`, not-null violation `23502` | 400 |
//! | `sqlx::Error::RowNotFound` | 404 |
//! | expired token | 401 `Token expired` |
//! | any other token failure | 401 `Invalid token` |
//! | everything else | 500 with the error's own message |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::{PricingError, SlotError, StatusError, UnknownRole};

use crate::auth::TokenError;
use crate::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::Unauthenticated | Self::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Self::Token(TokenError::Expired) => {
                (StatusCode::UNAUTHORIZED, "Token expired".to_string())
            }
            Self::Token(_) => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            Self::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Self::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            Self::Database(e) => database_status(e),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        }
    }
}

/// Map a PostgreSQL SQLSTATE to a client-facing status and message.
pub fn classify_sqlstate(code: &str) -> Option<(StatusCode, &'static str)> {
    match code {
        "23505" => Some((
            StatusCode::CONFLICT,
            "Duplicate entry: resource already exists",
        )),
        "23503" => Some((StatusCode::BAD_REQUEST, "Referenced record does not exist")),
        "22P02" => Some((StatusCode::BAD_REQUEST, "Invalid input syntax")),
        "23514" => Some((StatusCode::BAD_REQUEST, "Value violates a constraint")),
        "23502" => Some((StatusCode::BAD_REQUEST, "Missing required field")),
        _ => None,
    }
}

/// PostgreSQL reports a delete blocked by a referencing row as
/// `update or delete on table ... violates foreign key constraint`.
fn is_still_referenced(code: &str, message: &str) -> bool {
    code == "23503" && message.starts_with("update or delete on table")
}

fn database_status(error: &sqlx::Error) -> (StatusCode, String) {
    match error {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "Record not found".to_string()),
        sqlx::Error::Database(db)
            if db
                .code()
                .is_some_and(|code| is_still_referenced(&code, db.message())) =>
        {
            (
                StatusCode::CONFLICT,
                "Record is still referenced by other records".to_string(),
            )
        }
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| classify_sqlstate(&code))
            .map(|(status, message)| (status, message.to_string()))
            .unwrap_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, db.message().to_string())),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(%status, %message, "request rejected");
        }
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

impl From<StatusError> for ApiError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::Unknown { .. } => Self::BadRequest(e.to_string()),
            StatusError::Transition { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<SlotError> for ApiError {
    fn from(e: SlotError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<PricingError> for ApiError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
            _ => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<UnknownRole> for ApiError {
    fn from(e: UnknownRole) -> Self {
        Self::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{AppointmentStatus, Lifecycle};

    #[test]
    fn test_sqlstate_mapping() {
        assert_eq!(
            classify_sqlstate("23505").map(|(s, _)| s),
            Some(StatusCode::CONFLICT)
        );
        assert_eq!(
            classify_sqlstate("23503").map(|(s, _)| s),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            classify_sqlstate("22P02"),
            Some((StatusCode::BAD_REQUEST, "Invalid input syntax"))
        );
        assert_eq!(classify_sqlstate("40001"), None);
    }

    #[test]
    fn test_blocked_delete_is_recognized() {
        assert!(is_still_referenced(
            "23503",
            "update or delete on table \"medicines\" violates foreign key constraint \"order_items_medicine_id_fkey\" on table \"order_items\"",
        ));
        assert!(!is_still_referenced(
            "23503",
            "insert or update on table \"order_items\" violates foreign key constraint \"order_items_medicine_id_fkey\"",
        ));
        assert!(!is_still_referenced("23505", "update or delete on table \"x\""));
    }

    #[test]
    fn test_row_not_found_is_404() {
        let (status, message) = ApiError::from(sqlx::Error::RowNotFound).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Record not found");
    }

    #[test]
    fn test_other_database_errors_are_500() {
        let (status, message) = ApiError::from(sqlx::Error::PoolTimedOut).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, sqlx::Error::PoolTimedOut.to_string());
    }

    #[test]
    fn test_token_errors() {
        let (status, message) = ApiError::from(TokenError::Expired).status_and_message();
        assert_eq!((status, message.as_str()), (StatusCode::UNAUTHORIZED, "Token expired"));

        let (status, message) = ApiError::from(TokenError::Signature).status_and_message();
        assert_eq!((status, message.as_str()), (StatusCode::UNAUTHORIZED, "Invalid token"));
    }

    #[test]
    fn test_transition_is_conflict() {
        let err = AppointmentStatus::Completed
            .transition(AppointmentStatus::Scheduled)
            .unwrap_err();
        let (status, _) = ApiError::from(err).status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_response_envelope() {
        let response = ApiError::forbidden("Access denied").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Access denied");
    }
}
