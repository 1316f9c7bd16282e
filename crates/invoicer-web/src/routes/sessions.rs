//! Session routes - creating sessions and applying edits.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use invoicer_core::{FieldResolution, InvoiceRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{CommandBatch, CreateSessionRequest, SessionView};
use crate::helpers::{CoreResultExt, OptionExt, RouteResult};
use crate::state::AppState;

/// Create a session from an invoice, or a fresh invoice when none is given.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> RouteResult<(StatusCode, Json<SessionView>)> {
    let session_id = state.create_session(request.invoice).await;
    info!("Created session {}", session_id);

    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;
    let view = session
        .with_session(|s| SessionView::of(&session_id, s))
        .await
        .or_not_found("Session not found")?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Json<SessionView>> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    session
        .with_session(|s| Json(SessionView::of(&session_id, s)))
        .await
        .or_not_found("Session not found")
}

/// Apply one command or a batch. A failing batch leaves the session unchanged.
pub async fn apply_commands(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(batch): Json<CommandBatch>,
) -> RouteResult<Json<SessionView>> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    let now = Utc::now();
    session
        .with_session_mut(|s| {
            match batch {
                CommandBatch::One(command) => s.authoring.apply(command, now),
                CommandBatch::Many(commands) => s.authoring.apply_all(commands, now),
            }
            .map(|_| SessionView::of(&session_id, s))
        })
        .await
        .or_not_found("Session not found")?
        .or_status()
        .map(Json)
}

/// Storage record of the session's invoice, ready to hand to persistence
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Json<InvoiceRecord>> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    session
        .with_session(|s| -> invoicer_core::Result<InvoiceRecord> {
            let invoice = s.authoring.invoice();
            invoice.validate_for_save()?;
            InvoiceRecord::try_from(invoice)
        })
        .await
        .or_not_found("Session not found")?
        .or_status()
        .map(Json)
}

/// Result of translating one line item
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTranslation {
    pub resolution: FieldResolution,
    /// Present when the translation service was unavailable
    pub warning: Option<String>,
    pub session: SessionView,
}

/// Resolve the description of item `index` and store its translation.
///
/// A translation outage is not an error here: the item is left as typed and the response
/// carries a warning.
pub async fn translate_item(
    State(state): State<Arc<AppState>>,
    Path((session_id, index)): Path<(String, usize)>,
) -> RouteResult<Json<ItemTranslation>> {
    let session = state
        .get_session(&session_id)
        .await
        .or_not_found("Session not found")?;

    // Read the description inside the lock, translate outside it
    let description = session
        .with_session(|s| {
            let items = s.authoring.invoice().items();
            items
                .get(index)
                .map(|item| item.description.clone())
                .ok_or(invoicer_core::Error::IndexOutOfRange {
                    index,
                    len: items.len(),
                })
        })
        .await
        .or_not_found("Session not found")?
        .or_status()?;

    let resolution = state.resolver.resolve_for_field(&description).await.or_status()?;

    let now = Utc::now();
    let (warning, view) = session
        .with_session_mut(|s| -> invoicer_core::Result<_> {
            // The item may have been edited meanwhile; only fill in the text we translated
            let unchanged = s
                .authoring
                .invoice()
                .items()
                .get(index)
                .is_some_and(|item| item.description == description);
            let warning = if unchanged {
                s.authoring.apply_resolution(index, &resolution, now)?
            } else {
                Some("Description changed while translating; translate again".to_string())
            };
            Ok((warning, SessionView::of(&session_id, s)))
        })
        .await
        .or_not_found("Session not found")?
        .or_status()?;

    Ok(Json(ItemTranslation {
        resolution,
        warning,
        session: view,
    }))
}
