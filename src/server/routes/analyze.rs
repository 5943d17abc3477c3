use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use crate::analyzer::{BinAnalyzer, BinPhoto};
use crate::common::{BinError, CandidateManifest, ScoredCandidate};
use crate::inference_runners::InferenceProcess;
use crate::server::state::SharedState;

const MISSING_FIELDS: &str = "Missing image or bin data";

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub results: Vec<ScoredCandidate>,
    pub expected_quantity: Option<Value>,
}

/// Error body, carrying `expected_quantity` once the manifest has been read.
#[derive(Debug)]
pub struct AnalyzeError {
    status: StatusCode,
    message: String,
    expected_quantity: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_quantity: Option<&'a Value>,
}

impl AnalyzeError {
    fn with_expected(err: BinError, expected_quantity: Option<Value>) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
            expected_quantity,
        }
    }
}

impl From<BinError> for AnalyzeError {
    fn from(err: BinError) -> Self {
        Self::with_expected(err, None)
    }
}

impl From<MultipartError> for AnalyzeError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
            expected_quantity: None,
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("analyze failed: {}", self.message);
        } else {
            log::warn!("analyze rejected: {}", self.message);
        }
        let body = ErrorBody {
            error: &self.message,
            expected_quantity: self.expected_quantity.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// POST /api/analyze
///
/// The inference timeout bounds the response. The blocking task checks the same
/// deadline before the forward pass, but a forward pass already running is not
/// interrupted and finishes in the background.
pub async fn analyze(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AnalyzeError> {
    let (image, bin_data) = read_form(multipart).await?;
    let manifest = CandidateManifest::parse(&bin_data)?;
    let expected_quantity = manifest.expected_quantity.clone();

    let Some(session) = state.gate.session().await else {
        return Err(AnalyzeError::with_expected(BinError::Unavailable, expected_quantity));
    };

    let timeout = state.config.inference_timeout;
    let analyzer = BinAnalyzer::new(session, state.scorer.clone(), state.config.max_results)
        .with_deadline(Instant::now() + timeout);
    let photo = BinPhoto { image, manifest };
    let profile = state.config.profile;
    let task = tokio::task::spawn_blocking(move || analyzer.forward(&photo, profile));

    let outcome = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => Err(BinError::Inference(format!("analysis task failed: {join_err}"))),
        Err(_) => Err(BinError::Inference(format!("analysis exceeded {timeout:?}"))),
    };

    match outcome {
        Ok(results) => Ok(Json(AnalyzeResponse {
            results,
            expected_quantity,
        })),
        Err(err) => Err(AnalyzeError::with_expected(err, expected_quantity)),
    }
}

/// Collects the `image` and `bin_data` (or `binData`) fields; anything else is skipped.
async fn read_form(mut multipart: Multipart) -> Result<(Vec<u8>, String), AnalyzeError> {
    let mut image = None;
    let mut bin_data = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => image = Some(field.bytes().await?.to_vec()),
            Some("bin_data") | Some("binData") => bin_data = Some(field.text().await?),
            _ => {}
        }
    }

    match (image, bin_data) {
        (Some(image), Some(bin_data)) => Ok((image, bin_data)),
        _ => Err(BinError::InvalidRequest(MISSING_FIELDS.to_string()).into()),
    }
}
