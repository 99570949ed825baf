use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{paginate, FlowBlock, FlowCatalog, PageGeometry, PlacementPlan};
use crate::preview::store::{CompletedPass, PassInput, PreviewState};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginateRequest {
    pub blocks: Vec<FlowBlock>,
    pub page_inner_height: f64,
    pub allow_widow_orphans: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub blocks: Vec<FlowBlock>,
    /// Falls back to the configured default geometry.
    pub geometry: Option<PageGeometry>,
    pub allow_widow_orphans: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollUpdate {
    pub scroll_top: f64,
}

/// POST /api/v1/layout/paginate
pub async fn handle_paginate(
    State(state): State<AppState>,
    Json(req): Json<PaginateRequest>,
) -> Result<Json<PlacementPlan>, AppError> {
    let allow_widow_orphans = req
        .allow_widow_orphans
        .unwrap_or(state.config.allow_widow_orphans);
    let page_inner_height = req.page_inner_height;
    let catalog = FlowCatalog::new(req.blocks)?;

    let plan = tokio::task::spawn_blocking(move || {
        paginate(
            catalog.blocks(),
            &catalog,
            page_inner_height,
            allow_widow_orphans,
        )
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in paginate: {e}")))??;

    Ok(Json(plan))
}

/// POST /api/v1/preview/:document_id
pub async fn handle_preview_pass(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<CompletedPass>, AppError> {
    let input = PassInput {
        catalog: FlowCatalog::new(req.blocks)?,
        geometry: req.geometry.unwrap_or(state.config.page_geometry),
        allow_widow_orphans: req
            .allow_widow_orphans
            .unwrap_or(state.config.allow_widow_orphans),
    };

    let ticket = state.preview.begin(document_id)?;
    let done = state.preview.run_pass(ticket, input).await?;
    Ok(Json(done))
}

/// GET /api/v1/preview/:document_id
pub async fn handle_get_preview(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<PreviewState>, AppError> {
    state
        .preview
        .state(document_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No preview for document {document_id}")))
}

/// DELETE /api/v1/preview/:document_id
/// Called when the editor closes a document.
pub async fn handle_delete_preview(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.preview.remove(document_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No preview for document {document_id}")))
    }
}

/// PATCH /api/v1/preview/:document_id/scroll
pub async fn handle_scroll(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<ScrollUpdate>,
) -> Result<Json<PreviewState>, AppError> {
    let updated = state.preview.update_scroll(document_id, req.scroll_top)?;
    Ok(Json(updated))
}
