//! Run API server
//!
//! HTTP server hosting the step-execution endpoints and read access to
//! flows, reports and live run markers.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tower_http::cors::CorsLayer;

pub use api::AppState;

/// Start the server. Runs until ctrl-c.
pub async fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let app = Router::new()
        .merge(api::api_router())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("\n🧭 Run API started!");
    println!("   Listening: http://localhost:{}", port);
    println!("\n   Press Ctrl+C to stop.\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
