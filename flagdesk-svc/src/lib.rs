//! flagdesk-svc library interface
//!
//! Manifest reconciliation and order lookup service. Exposes the router and
//! its building blocks for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod session;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{DisabledExtractor, GeminiExtractor, IngestOrchestrator, RowExtractor};
use crate::session::{PasswordGate, SessionStore};
use crate::store::StoreAdapter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Live view of the record table
    pub store: StoreAdapter,
    pub orchestrator: Arc<IngestOrchestrator>,
    pub sessions: Arc<SessionStore>,
    pub password: PasswordGate,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last store or ingest failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        store: StoreAdapter,
        extractor: Arc<dyn RowExtractor>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            orchestrator: Arc::new(IngestOrchestrator::new(
                extractor,
                store.clone(),
                &config.ingest,
            )),
            store,
            sessions: Arc::new(SessionStore::new(&config.session)),
            password: PasswordGate::new(config.admin_password.as_deref()),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a server-side failure for `/health`
    pub async fn record_error(&self, error: ApiError) -> ApiError {
        if matches!(error, ApiError::Common(_) | ApiError::Ingest(_)) {
            *self.last_error.write().await = Some(error.to_string());
        }
        error
    }
}

/// Pick the extractor implementation for the configured API key
pub fn build_extractor(config: &ServiceConfig) -> flagdesk_common::Result<Arc<dyn RowExtractor>> {
    match &config.extractor.api_key {
        Some(api_key) => {
            let extractor = GeminiExtractor::new(api_key.clone(), &config.extractor)
                .map_err(|e| flagdesk_common::Error::Config(e.to_string()))?;
            Ok(Arc::new(extractor))
        }
        None => Ok(Arc::new(DisabledExtractor)),
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::lookup_routes())
        .merge(api::session_routes())
        .merge(api::admin_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
