//! Shared state handed to every route.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::inference_runners::{PlaceholderScorer, Scorer, DEFAULT_RESULT_LIMIT};
use crate::session_gate::SessionGate;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP-facing settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Rows returned per analysis
    pub max_results: usize,
    /// Request body cap, applied to the multipart upload
    pub max_upload_bytes: usize,
    /// Wall-time budget for decode, preprocess, inference and ranking
    pub inference_timeout: Duration,
    /// Served at `/` when it exists
    pub dashboard_dir: PathBuf,
    /// Log per-stage timings at info level
    pub profile: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_RESULT_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            dashboard_dir: PathBuf::from("dashboard"),
            profile: false,
        }
    }
}

pub struct AppState {
    pub gate: Arc<SessionGate>,
    pub scorer: Arc<dyn Scorer>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(gate: Arc<SessionGate>, config: ServerConfig) -> Self {
        Self {
            gate,
            scorer: Arc::new(PlaceholderScorer),
            config,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }
}

pub type SharedState = Arc<AppState>;
