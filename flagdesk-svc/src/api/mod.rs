//! HTTP API handlers for flagdesk-svc

pub mod admin;
pub mod health;
pub mod lookup;
pub mod session;

pub use admin::admin_routes;
pub use health::health_routes;
pub use lookup::lookup_routes;
pub use session::session_routes;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Header carrying the session id returned by `POST /session`
pub const SESSION_HEADER: &str = "x-session-id";

/// Session id from the request headers
pub fn session_id(headers: &HeaderMap) -> ApiResult<Uuid> {
    let value = headers
        .get(SESSION_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", SESSION_HEADER)))?;

    value
        .to_str()
        .ok()
        .and_then(|text| Uuid::parse_str(text.trim()).ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("malformed {} header", SESSION_HEADER)))
}
