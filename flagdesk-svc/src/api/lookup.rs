//! Order lookup endpoint
//!
//! GET /lookup?q=0351

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use flagdesk_common::lookup::{LookupIndex, LookupQuery, MatchMode};
use flagdesk_common::OrderRecord;

use crate::{error::ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub q: String,
}

/// Lookup response: the cleaned query and every match in store order
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub query: String,
    pub mode: MatchMode,
    pub matches: Vec<OrderRecord>,
}

/// Validate `raw`, read the store live and match
///
/// The query is validated before the store is read, so an empty query
/// never costs a round trip.
pub async fn run_lookup(state: &AppState, raw: &str) -> ApiResult<LookupResponse> {
    let query = LookupQuery::parse(raw)?;

    let index = match state.store.read().await {
        Ok(set) => LookupIndex::new(set.records),
        Err(e) => return Err(state.record_error(e.into()).await),
    };

    let matches = index.find(&query);
    tracing::debug!(
        query = query.digits(),
        records = index.len(),
        matches = matches.len(),
        "Lookup"
    );

    Ok(LookupResponse {
        query: query.digits().to_string(),
        mode: query.mode(),
        matches,
    })
}

/// GET /lookup
pub async fn lookup_orders(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Json<LookupResponse>> {
    Ok(Json(run_lookup(&state, &params.q).await?))
}

pub fn lookup_routes() -> Router<AppState> {
    Router::new().route("/lookup", get(lookup_orders))
}
