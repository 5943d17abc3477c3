use crate::common::inference_device::InferenceDevice;
use crate::common::inference_processor::InferenceProcessor;
use crate::inference_runners::NativeArchitecture;

pub const DEFAULT_IMAGE_SIZE: u32 = 224;
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Everything needed to acquire, load and feed the model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub weights_path: String,
    pub model_url: Option<String>,
    pub ort_lib_path: Option<String>,
    pub inference_device: InferenceDevice,
    pub inference_processor: InferenceProcessor,
    pub native_architecture: Option<NativeArchitecture>,
    pub image_size: u32,
    pub download_attempts: u32,
    pub dry_run: bool,
    pub profile: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: "model.onnx".to_string(),
            model_url: None,
            ort_lib_path: None,
            inference_device: InferenceDevice::default(),
            inference_processor: InferenceProcessor::default(),
            native_architecture: None,
            image_size: DEFAULT_IMAGE_SIZE,
            download_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            dry_run: true,
            profile: false,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_model(mut self, weights_path: &str) -> Self {
        self.weights_path = weights_path.to_string();
        self
    }

    /// Empty strings count as "not configured", the same as an unset variable.
    pub fn with_model_url(mut self, url: Option<&str>) -> Self {
        self.model_url = url.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string);
        self
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: Option<&str>) -> Self {
        self.ort_lib_path = ort_lib_path.map(str::to_string);
        self
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.inference_device = device;
        self
    }

    pub fn with_processor(mut self, processor: InferenceProcessor) -> Self {
        self.inference_processor = processor;
        self
    }

    pub fn with_native_architecture(mut self, architecture: Option<NativeArchitecture>) -> Self {
        self.native_architecture = architecture;
        self
    }

    pub fn with_image_size(mut self, n: u32) -> Self {
        self.image_size = n;
        self
    }

    pub fn with_download_attempts(mut self, n: u32) -> Self {
        self.download_attempts = n.max(1);
        self
    }

    pub fn with_dry_run(mut self, x: bool) -> Self {
        self.dry_run = x;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }
}

impl std::fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Weights File Path: {}\n\
            Model URL: {}\n\
            OnnxRuntime Lib Path: {}\n\
            Inference Device: {}\n\
            Inference Processor: {}\n\
            Native Architecture: {}\n\
            Model Input Resolution: {}x{}",
            self.weights_path,
            self.model_url.as_deref().unwrap_or("<local only>"),
            self.ort_lib_path.as_deref().unwrap_or("<default>"),
            self.inference_device,
            self.inference_processor,
            self.native_architecture.map(|a| a.str()).unwrap_or("<from checkpoint>"),
            self.image_size,
            self.image_size,
        )
    }
}
