mod bin_image;
mod error;
mod inference_device;
mod inference_processor;
mod manifest;
mod model_config;
mod scored_candidate;

pub use bin_image::*;
pub use error::*;
pub use inference_device::*;
pub use inference_processor::*;
pub use manifest::*;
pub use model_config::*;
pub use scored_candidate::*;
