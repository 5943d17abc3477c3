pub mod backend;
pub mod image_ops;
pub mod inference_process;
pub mod input_wrapper;
pub mod native_runner;
pub mod ort_runner;
pub mod ranker;

pub use backend::{load_backend, ForwardPass};
pub use inference_process::InferenceProcess;
pub use input_wrapper::X;
pub use native_runner::{NativeArchitecture, NativeEngine};
pub use ort_runner::OrtEngine;
pub use ranker::{rank, PlaceholderScorer, Scorer, DEFAULT_RESULT_LIMIT};
