use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use marquee_model::ModelError;

use super::config::ConfigLoadError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Set when the failure came from the database being unreachable or
    /// overloaded rather than from the statement itself.
    pub db_unavailable: bool,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            db_unavailable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            db_unavailable: true,
            ..Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

/// Postgres SQLSTATE codes that mean "try again later" rather than "this
/// statement is wrong": deadlock, lock timeout, statement timeout and the
/// whole connection exception class.
const AVAILABILITY_SQLSTATES: &[&str] = &["40P01", "55P03", "57014", "57P01"];

/// Whether a database error indicates the database (or the pool) is not
/// available. Rolling back on such a connection is pointless and may hang.
pub fn is_availability_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|code| {
            code.starts_with("08") || AVAILABILITY_SQLSTATES.contains(&code.as_ref())
        }),
        _ => false,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_availability_error(&err) {
            tracing::error!(error = ?err, "database unavailable");
            return Self::unavailable("Database is temporarily unavailable");
        }

        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some("23505") => {
                    return Self::conflict("a record with the same unique value already exists");
                }
                Some("23503") => {
                    return Self::bad_request("referenced record does not exist");
                }
                Some("23502") | Some("23514") => {
                    return Self::bad_request(db.message().to_string());
                }
                _ => {}
            }
        }

        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::not_found("record not found");
        }

        tracing::error!(error = ?err, "database operation failed");
        Self::internal("Database operation failed")
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ConfigLoadError> for AppError {
    fn from(err: ConfigLoadError) -> Self {
        tracing::error!(error = %err, "configuration error");
        Self::internal("Server configuration error")
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "internal error");
        Self::internal(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!(error = %err, "cache operation failed");
        Self::internal("Cache operation failed")
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!(error = %err, "filesystem operation failed");
        Self::internal("File operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_availability_errors() {
        assert!(is_availability_error(&sqlx::Error::PoolTimedOut));
        assert!(is_availability_error(&sqlx::Error::PoolClosed));
        assert!(!is_availability_error(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn pool_timeout_maps_to_unavailable() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.db_unavailable);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(!err.db_unavailable);
    }

    #[test]
    fn model_errors_are_bad_requests() {
        let err = AppError::from(ModelError::InvalidSortDirection);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "order must be ASC or DESC");
    }

    #[test]
    fn config_errors_do_not_leak_details() {
        let err = AppError::from(ConfigLoadError::MissingValue { key: "DATABASE_URL" });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("DATABASE_URL"));
    }
}
