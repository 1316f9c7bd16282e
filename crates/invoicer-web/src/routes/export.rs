//! Export routes - PDF, editable document, preview and share.
//!
//! Each export holds the session's export ticket for its whole duration, so a second export
//! of the same session is rejected with 409 until the first one finishes.

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use chrono::Utc;
use invoicer_core::export::{
    DEFAULT_PREVIEW_WIDTH, DOC_CONTENT_TYPE, DOC_EXTENSION, PDF_CONTENT_TYPE, PREVIEW_CONTENT_TYPE,
};
use invoicer_core::{ExportTicket, Invoice, ShareOutcome, VisualTree};
use std::sync::Arc;
use tracing::info;

use super::{ExportQuery, ShareRequest, download_name};
use crate::helpers::{CoreResultExt, OptionExt, ResultExt, RouteResult};
use crate::state::AppState;

/// Largest preview a client may ask for
const MAX_PREVIEW_WIDTH: u32 = 2400;

/// What an export needs, captured under the session lock
struct Prepared {
    _ticket: ExportTicket,
    tree: VisualTree,
    invoice: Invoice,
}

async fn prepare(
    state: &AppState,
    session_id: &str,
    query: &ExportQuery,
) -> RouteResult<Prepared> {
    let session = state
        .get_session(session_id)
        .await
        .or_not_found("Session not found")?;

    let options = query.render_options(&state.config, Utc::now());
    session
        .with_session(|s| -> invoicer_core::Result<Prepared> {
            let ticket = s.authoring.begin_export()?;
            let tree = s.authoring.render(&options)?;
            Ok(Prepared {
                _ticket: ticket,
                tree,
                invoice: s.authoring.invoice().clone(),
            })
        })
        .await
        .or_not_found("Session not found")?
        .or_status()
}

fn attachment(bytes: Vec<u8>, content_type: &str, filename: &str) -> RouteResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .or_internal_error()
}

/// Download the invoice as a single-page PDF.
pub async fn export_pdf(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> RouteResult<Response> {
    let prepared = prepare(&state, &session_id, &query).await?;
    let exported = state.pipeline.export_pdf(&prepared.tree).await.or_status()?;

    info!("Exported PDF for session {}", session_id);
    attachment(
        exported.bytes,
        PDF_CONTENT_TYPE,
        &download_name(prepared.invoice.invoice_number(), "pdf"),
    )
}

/// Download the invoice as an editable Word-compatible document.
pub async fn export_doc(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> RouteResult<Response> {
    let prepared = prepare(&state, &session_id, &query).await?;
    let document = state.pipeline.export_document(&prepared.tree).or_status()?;

    attachment(
        document.into_bytes(),
        DOC_CONTENT_TYPE,
        &download_name(prepared.invoice.invoice_number(), DOC_EXTENSION),
    )
}

/// WebP preview of the invoice as it will print.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> RouteResult<Response> {
    let width = query
        .width
        .unwrap_or(DEFAULT_PREVIEW_WIDTH)
        .clamp(1, MAX_PREVIEW_WIDTH);
    let prepared = prepare(&state, &session_id, &query).await?;
    let image = state.pipeline.preview(&prepared.tree, width).await.or_status()?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PREVIEW_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(image))
        .or_internal_error()
}

/// Export, upload and return the share message and link.
pub async fn share(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ExportQuery>,
    Json(request): Json<ShareRequest>,
) -> RouteResult<Json<ShareOutcome>> {
    if !state.pipeline.has_uploader() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Uploads are not configured".to_string(),
        ));
    }

    let prepared = prepare(&state, &session_id, &query).await?;
    let outcome = state
        .pipeline
        .share(&prepared.invoice, &prepared.tree, request.message.as_deref())
        .await
        .or_status()?;

    info!("Shared session {} as {}", session_id, outcome.key);
    Ok(Json(outcome))
}
