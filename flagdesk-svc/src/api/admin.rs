//! Admin endpoints
//!
//! Every route except login requires a session whose admin gate is
//! unlocked. Clearing the store is two-step: arm, then confirm.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use flagdesk_common::OrderRecord;

use crate::api::session_id;
use crate::error::{ApiError, ApiResult};
use crate::services::{IngestReport, SourceFile};
use crate::session::AdminState;
use crate::AppState;

/// Upload size cap for one ingest request (photos and scanned PDFs)
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminStateResponse {
    pub admin: AdminState,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub count: usize,
    /// False when the table was never initialized
    pub has_headers: bool,
    pub records: Vec<OrderRecord>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// Fail unless the calling session is unlocked
async fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let id = session_id(headers)?;
    state
        .sessions
        .with_session(id, |session| session.admin.require_unlocked())
        .await??;
    Ok(())
}

/// POST /admin/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AdminStateResponse>> {
    let id = session_id(&headers)?;

    // Resolve the session first so an unknown session never reaches the
    // password check
    state.sessions.with_session(id, |_| ()).await?;

    if let Err(e) = state.password.verify(&request.password) {
        tracing::warn!(session = %id, "Admin login rejected: {}", e);
        return Err(e.into());
    }

    let admin = state
        .sessions
        .with_session(id, |session| {
            session.admin.login();
            session.admin
        })
        .await?;

    tracing::info!(session = %id, "Admin unlocked");
    Ok(Json(AdminStateResponse { admin }))
}

/// POST /admin/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<AdminStateResponse>> {
    let id = session_id(&headers)?;
    let admin = state
        .sessions
        .with_session(id, |session| {
            session.admin.logout();
            session.admin
        })
        .await?;

    Ok(Json(AdminStateResponse { admin }))
}

/// GET /admin/records
pub async fn list_records(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<RecordsResponse>> {
    require_admin(&state, &headers).await?;

    let set = match state.store.read().await {
        Ok(set) => set,
        Err(e) => return Err(state.record_error(e.into()).await),
    };

    Ok(Json(RecordsResponse {
        count: set.records.len(),
        has_headers: set.has_headers,
        records: set.records,
    }))
}

/// POST /admin/ingest
///
/// Multipart upload; every part carrying a file name is a source, taken
/// in upload order.
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<IngestReport>> {
    require_admin(&state, &headers).await?;

    let mut sources = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read '{}': {}", name, e)))?;
        sources.push(SourceFile::new(name, bytes.to_vec()));
    }

    if sources.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    match state.orchestrator.run_batch(sources).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err(state.record_error(e.into()).await),
    }
}

/// POST /admin/clear/arm
pub async fn arm_clear(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<AdminStateResponse>> {
    let id = session_id(&headers)?;
    let admin = state
        .sessions
        .with_session(id, |session| {
            session.admin.arm_clear().map(|_| session.admin)
        })
        .await??;

    tracing::info!(session = %id, "Store clear armed");
    Ok(Json(AdminStateResponse { admin }))
}

/// POST /admin/clear/confirm
pub async fn confirm_clear(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ClearResponse>> {
    let id = session_id(&headers)?;
    state
        .sessions
        .with_session(id, |session| session.admin.confirm_clear())
        .await??;

    if let Err(e) = state.store.clear().await {
        return Err(state.record_error(e.into()).await);
    }

    tracing::warn!(session = %id, "Store cleared by admin");
    Ok(Json(ClearResponse { cleared: true }))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .route("/admin/records", get(list_records))
        .route(
            "/admin/ingest",
            post(ingest).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/admin/clear/arm", post(arm_clear))
        .route("/admin/clear/confirm", post(confirm_clear))
}
