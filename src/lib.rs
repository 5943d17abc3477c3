mod utils;
pub mod analyzer;
pub mod artifact;
pub mod common;
pub mod inference_runners;
pub mod server;
pub mod session_gate;

use std::sync::Arc;

use crate::common::ModelConfig;
use crate::server::{AppState, ServerConfig};
use crate::session_gate::SessionGate;

pub use crate::common::{BinError, Result};

/// Builds the session gate and, unless `lazy` is set, runs the model load now.
///
/// A failed load is logged and leaves the service answering without a model.
pub async fn init_service(model: ModelConfig, server: ServerConfig, lazy: bool) -> Arc<AppState> {
    log::info!("Initializing {model}");
    let gate = Arc::new(SessionGate::new(model));
    if lazy {
        log::info!("Lazy loading enabled, the model loads on the first analysis");
    } else if gate.session().await.is_none() {
        log::warn!("Model unavailable at startup, /api/analyze will answer with an error");
    }
    Arc::new(AppState::new(gate, server))
}
