use ndarray::{Array, IxDyn};

use crate::common::{InferenceProcessor, ModelConfig, Result};
use crate::inference_runners::input_wrapper::X;
use crate::inference_runners::native_runner::NativeEngine;
use crate::inference_runners::ort_runner::OrtEngine;

/// Uniform "run forward pass" contract shared by every execution backend.
///
/// Implementations must be usable from several request threads at once.
pub trait ForwardPass: Send + Sync {
    /// Runs the model on a `(1, 3, S, S)` batch and returns its primary output.
    fn run(&self, x: &X) -> Result<Array<f32, IxDyn>>;

    /// Execution providers in priority order. Empty when the backend has no
    /// provider introspection.
    fn providers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Spatial input size the model declares, if it is static.
    fn input_size(&self) -> Option<usize> {
        None
    }
}

/// Loads the artifact at `config.weights_path` with the configured processor.
pub fn load_backend(config: &ModelConfig) -> Result<Box<dyn ForwardPass>> {
    log::info!(
        "Loading {} with the {} processor on {}",
        config.weights_path,
        config.inference_processor,
        config.inference_device
    );
    let backend: Box<dyn ForwardPass> = match config.inference_processor {
        InferenceProcessor::ORT => Box::new(OrtEngine::new(config)?),
        InferenceProcessor::Native => Box::new(NativeEngine::new(config)?),
    };
    Ok(backend)
}
