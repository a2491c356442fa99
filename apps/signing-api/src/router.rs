//! Route table for the signing API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Public endpoints are meant to be embedded cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Token-addressed signing session
        .route(
            "/public/sign/:token",
            get(handlers::get_session).post(handlers::submit_session),
        )
        .route(
            "/public/sign/:token/proceed",
            post(handlers::proceed_session),
        )
        .route(
            "/public/sign/:token/complete",
            post(handlers::complete_session),
        )
        .route(
            "/public/sign/:token/signing-callback",
            get(handlers::signing_callback),
        )
        .route(
            "/public/sign/:token/request-access",
            post(handlers::request_access_by_token),
        )
        // Public document access
        .route("/public/doc/:document_id", get(handlers::get_access_info))
        .route(
            "/public/doc/:document_id/request-access",
            post(handlers::request_access_by_email),
        )
        // Dispatch
        .route("/admin/sessions", post(handlers::create_sessions))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
