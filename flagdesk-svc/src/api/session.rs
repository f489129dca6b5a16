//! Session lifecycle and keypad entry
//!
//! POST /session, DELETE /session, POST /session/keypad

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flagdesk_common::OrderRecord;

use crate::api::{lookup::run_lookup, session_id};
use crate::session::AdminState;
use crate::{error::ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub admin: AdminState,
}

#[derive(Debug, Deserialize)]
pub struct KeypadRequest {
    /// A single digit, `backspace` or `clear`
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct KeypadResponse {
    pub buffer: String,
    /// Matches for the current buffer; empty while the buffer is empty
    pub matches: Vec<OrderRecord>,
}

/// POST /session
pub async fn create_session(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<CreateSessionResponse>)> {
    let id = state.sessions.create().await;
    let created_at = state.sessions.with_session(id, |s| s.created_at).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: id,
            created_at,
            admin: AdminState::Locked,
        }),
    ))
}

/// DELETE /session
pub async fn end_session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let id = session_id(&headers)?;
    state.sessions.remove(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /session/keypad
///
/// Applies the key to this session's buffer, then runs a lookup for the
/// buffer contents when it is non-empty.
pub async fn press_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<KeypadRequest>,
) -> ApiResult<Json<KeypadResponse>> {
    let id = session_id(&headers)?;

    let buffer = state
        .sessions
        .with_session(id, |session| {
            session
                .keypad
                .apply(&request.key)
                .map(|_| session.keypad.as_str().to_string())
        })
        .await??;

    let matches = if buffer.is_empty() {
        Vec::new()
    } else {
        run_lookup(&state, &buffer).await?.matches
    };

    Ok(Json(KeypadResponse { buffer, matches }))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(create_session).delete(end_session))
        .route("/session/keypad", post(press_key))
}
