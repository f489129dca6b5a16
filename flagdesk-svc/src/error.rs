//! Error types for flagdesk-svc HTTP handlers
//!
//! Query validation is its own code so a client can tell "type a digit"
//! apart from "no such order" (an empty match list, not an error).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use flagdesk_common::lookup::QueryError;

use crate::services::ingest_orchestrator::IngestError;
use crate::session::SessionError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Lookup query had no digits (400)
    #[error("{0}")]
    Query(#[from] QueryError),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or malformed session header (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session, login or keypad rejection
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Ingestion batch failed before anything was written
    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),

    /// flagdesk-common error (store I/O, config, ...)
    #[error("{0}")]
    Common(#[from] flagdesk_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::Query(_) => (StatusCode::BAD_REQUEST, "QUERY_INVALID"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Session(SessionError::ClearNotArmed) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Session(SessionError::KeypadFull(_) | SessionError::InvalidKey(_)) => {
                (StatusCode::BAD_REQUEST, "KEYPAD_INVALID")
            }
            ApiError::Session(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Ingest(IngestError::Store(flagdesk_common::Error::VersionConflict { .. })) => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            ApiError::Ingest(IngestError::Store(_)) => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
            ApiError::Ingest(IngestError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ApiError::Ingest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "SOURCE_UNREADABLE"),
            ApiError::Common(flagdesk_common::Error::VersionConflict { .. }) => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            ApiError::Common(flagdesk_common::Error::Store(_))
            | ApiError::Common(flagdesk_common::Error::Database(_)) => {
                (StatusCode::BAD_GATEWAY, "STORE_ERROR")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
