pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/webhook", post(routes::webhook::receive))
        .route("/cron/stale", post(routes::cron::stale))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the server on `addr` (e.g. `0.0.0.0:8080`).
pub async fn serve(app_state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(app_state, listener).await
}

/// Start the server on a pre-bound listener, so the caller can read the
/// actual port when binding to port 0.
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("issuebot listening on http://{local}");

    axum::serve(listener, app).await?;
    Ok(())
}
