pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::preview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stateless pagination
        .route("/api/v1/layout/paginate", post(handlers::handle_paginate))
        // Live preview
        .route(
            "/api/v1/preview/:document_id",
            post(handlers::handle_preview_pass)
                .get(handlers::handle_get_preview)
                .delete(handlers::handle_delete_preview),
        )
        .route(
            "/api/v1/preview/:document_id/scroll",
            patch(handlers::handle_scroll),
        )
        .with_state(state)
}
