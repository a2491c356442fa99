//! Signflow API Server - Backend for the public signing flow
//!
//! Provides REST endpoints for:
//! - Token-addressed signing sessions (preview, submit, proceed, complete)
//! - The provider-agnostic signing callback bridge
//! - Public document access and signing-link recovery
//! - Document dispatch

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod error;
mod handlers;
mod models;
mod router;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signing_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Initialize application state
    info!("Initializing Signflow API...");
    let state = Arc::new(AppState::new().await?);

    let app = router::build_router(state);

    // Parse bind address
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting Signflow API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
