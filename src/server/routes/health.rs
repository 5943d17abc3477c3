use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::state::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub providers: Vec<String>,
    pub backend: Option<String>,
}

/// GET /api/health
///
/// Never triggers a model load; a lazily configured gate reports `false` until the
/// first analysis.
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let session = state.gate.loaded();
    Json(HealthResponse {
        status: "ok",
        model_loaded: session.is_some(),
        providers: session.as_ref().map(|s| s.providers()).unwrap_or_default(),
        backend: session.map(|s| s.processor().str_lowercase().to_string()),
    })
}
