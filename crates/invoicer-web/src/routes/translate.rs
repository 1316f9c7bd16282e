//! Translation routes - free-text resolution and autocomplete.

use axum::{
    Json,
    extract::{Query, State},
};
use invoicer_core::{FieldResolution, TranslationEntry};
use std::sync::Arc;

use super::{SuggestQuery, TranslateRequest};
use crate::helpers::{CoreResultExt, RouteResult};
use crate::state::AppState;

/// Upper bound on suggestions per request
const MAX_SUGGESTIONS: usize = 50;

/// Resolve a description into all of its representations.
///
/// Translation outages come back as a `degraded` resolution, not as an error status.
pub async fn translate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranslateRequest>,
) -> RouteResult<Json<FieldResolution>> {
    state
        .resolver
        .resolve_for_field(&request.text)
        .await
        .or_status()
        .map(Json)
}

/// Stored descriptions matching `q`. Clients are expected to debounce.
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> RouteResult<Json<Vec<TranslationEntry>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.store.suggestion_limit)
        .min(MAX_SUGGESTIONS);

    state
        .resolver
        .search_similar(&query.q, limit)
        .await
        .or_status()
        .map(Json)
}
