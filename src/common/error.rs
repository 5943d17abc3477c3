//! Error taxonomy for the serving pipeline.
//!
//! Every variant is caught at the request boundary and rendered as
//! `{"error": message}`; none of them terminate the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T, E = BinError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BinError {
    /// No artifact on disk and no way to fetch one (or the fetch failed).
    #[error("Model artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    /// Artifact present but the backend could not turn it into a session.
    #[error("Model failed to load: {0}")]
    ModelLoad(String),

    /// Uploaded bytes are not a decodable image.
    #[error("Invalid image: {0}")]
    Decode(String),

    /// `bin_data` is not JSON or does not have the manifest shape.
    #[error("Invalid bin data: {0}")]
    ManifestParse(String),

    /// The forward pass (or a shape check around it) failed.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// A request arrived while no session is loaded.
    #[error("Model not loaded")]
    Unavailable,

    /// Malformed multipart request.
    #[error("{0}")]
    InvalidRequest(String),
}

impl BinError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BinError::Decode(_) | BinError::ManifestParse(_) | BinError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            BinError::Unavailable | BinError::ArtifactUnavailable(_) | BinError::ModelLoad(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            BinError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BinError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<image::ImageError> for BinError {
    fn from(err: image::ImageError) -> Self {
        BinError::Decode(err.to_string())
    }
}

impl From<ort::Error> for BinError {
    fn from(err: ort::Error) -> Self {
        BinError::Inference(err.to_string())
    }
}

impl From<candle_core::Error> for BinError {
    fn from(err: candle_core::Error) -> Self {
        BinError::Inference(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BinError {
    fn from(err: ndarray::ShapeError) -> Self {
        BinError::Inference(format!("tensor shape mismatch: {err}"))
    }
}
