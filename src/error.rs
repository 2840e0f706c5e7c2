use std::time::Duration;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError, services::catalog_client::CatalogError,
    state::attempt::AttemptError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Referenced attempt, competition or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Mutation attempted on a completed attempt.
    #[error("try already finished")]
    AlreadyFinished,
    /// Blocked by the cooldown gate; retry after `remaining`.
    #[error("too many attempts, please wait {}s", .remaining.as_secs())]
    RateLimited { remaining: Duration },
    /// The answer checker failed or returned malformed data.
    #[error("answer check failed: {0}")]
    UpstreamCheckFailure(#[source] CatalogError),
    /// Exclusive access to the attempt could not be obtained.
    #[error("concurrent update on `{0}`, please retry")]
    ConcurrencyConflict(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Caller identity is missing or unknown.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is known but may not see the resource yet.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Unexpected failure inside the service.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { key } => ServiceError::ConcurrencyConflict(key),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<AttemptError> for ServiceError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::AlreadyFinished => ServiceError::AlreadyFinished,
        }
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidStep(step) => {
                ServiceError::InvalidInput(format!("invalid puzzle step `{step}`"))
            }
            other => ServiceError::UpstreamCheckFailure(other),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller lacks permission for the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Submission rejected by the cooldown gate.
    #[error("too many attempts, please wait")]
    TooManyAttempts { wait_time_seconds: u64 },
    /// Upstream dependency answered badly.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::AlreadyFinished => AppError::Conflict("try already finished".into()),
            ServiceError::RateLimited { remaining } => AppError::TooManyAttempts {
                wait_time_seconds: wait_seconds(remaining),
            },
            ServiceError::UpstreamCheckFailure(source) => AppError::BadGateway(source.to_string()),
            ServiceError::ConcurrencyConflict(key) => {
                AppError::Conflict(format!("concurrent update on `{key}`, please retry"))
            }
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

/// Whole seconds to wait, rounded up so clients never retry too early.
fn wait_seconds(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct RateLimitedBody {
    error: String,
    wait_time_seconds: u64,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if let AppError::TooManyAttempts { wait_time_seconds } = self {
            let payload = Json(RateLimitedBody {
                error: self.to_string(),
                wait_time_seconds,
            });
            return (StatusCode::TOO_MANY_REQUESTS, payload).into_response();
        }

        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
