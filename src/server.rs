//! HTTP facade: health, analysis, CORS and the static dashboard.

pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use state::{AppState, ServerConfig, SharedState};

pub fn router(state: SharedState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let dashboard_dir = state.config.dashboard_dir.clone();

    let mut app = Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/analyze", post(routes::analyze::analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    if dashboard_dir.is_dir() {
        log::info!("Serving dashboard from {}", dashboard_dir.display());
        app = app.fallback_service(ServeDir::new(&dashboard_dir));
    } else {
        log::warn!("Dashboard directory {} not found, serving the API only", dashboard_dir.display());
    }

    app.layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
