//! Template routes - the template set new sessions start with.

use axum::{Json, extract::State, http::StatusCode};
use invoicer_core::{Template, TemplateRegistry};
use std::sync::Arc;

use crate::helpers::RouteResult;
use crate::state::AppState;

pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<Template>> {
    Json(state.default_templates().await.list().to_vec())
}

/// Replace the starting templates. Existing sessions keep their own copies.
pub async fn replace_templates(
    State(state): State<Arc<AppState>>,
    Json(templates): Json<Vec<Template>>,
) -> RouteResult<Json<Vec<Template>>> {
    if templates.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "At least one template is required".to_string(),
        ));
    }

    let registry = TemplateRegistry::from_templates(templates);
    let list = registry.list().to_vec();
    state.set_default_templates(registry).await;
    Ok(Json(list))
}
