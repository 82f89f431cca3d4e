//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError, SeatsError};
use saga::SagaError;

use crate::application::AppError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Process manager error.
    Saga(SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => (domain_status(&err), err.to_string()),
            ApiError::Saga(err) => (saga_status(&err), err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(OrderError::InvalidTicketCount { .. })
        | DomainError::Seats(SeatsError::InvalidQuantity { .. }) => StatusCode::BAD_REQUEST,
        DomainError::Order(OrderError::InvalidState { .. } | OrderError::AlreadyPlaced { .. })
        | DomainError::Seats(SeatsError::InvalidState { .. } | SeatsError::AlreadyCreated { .. })
        | DomainError::AlreadyExists { .. } => StatusCode::CONFLICT,
        DomainError::AggregateNotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::ConcurrencyRetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::InvalidOperation { .. } => StatusCode::CONFLICT,
        SagaError::Domain(inner) => domain_status(inner),
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest(msg) => ApiError::BadRequest(msg),
            AppError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            AppError::Domain(err) => ApiError::Domain(err),
            AppError::Saga(err) => ApiError::Saga(err),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
