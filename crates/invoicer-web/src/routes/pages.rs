//! Page routes - full HTML pages.

use axum::extract::{Path, State};
use std::sync::Arc;

use crate::helpers::{OptionExt, RouteResult};
use crate::state::AppState;
use crate::templates::{IndexTemplate, SessionTemplate, TemplateOption};

pub async fn index(State(state): State<Arc<AppState>>) -> IndexTemplate {
    let templates = state
        .default_templates()
        .await
        .list()
        .iter()
        .map(|t| TemplateOption {
            id: t.id.clone(),
            name: t.name.clone(),
        })
        .collect();

    IndexTemplate {
        templates,
        session_count: state.session_count().await,
    }
}

pub async fn session_page(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<SessionTemplate> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    session
        .with_session(|s| SessionTemplate::of(&session_id, s))
        .await
        .or_not_found("Session not found")
}
