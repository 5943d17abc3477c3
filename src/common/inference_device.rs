#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceDevice {
    CPU,
    CUDA(usize),
    TensorRT(usize),
    CoreML(usize),
}

impl Default for InferenceDevice {
    fn default() -> Self {
        InferenceDevice::CUDA(0)
    }
}

// Hardcoded device names. Storing the "proper" spelling and the lowercase version.
const CPU: [&str; 2] = ["CPU", "cpu"];
const CUDA: [&str; 2] = ["CUDA", "cuda"];
const TENSOR_RT: [&str; 2] = ["TensorRT", "tensorrt"];
const CORE_ML: [&str; 2] = ["CoreML", "coreml"];

impl InferenceDevice {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" | "gpu" => Some(InferenceDevice::CUDA(device_id)),
            "tensorrt" => Some(InferenceDevice::TensorRT(device_id)),
            "coreml" => Some(InferenceDevice::CoreML(device_id)),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => CPU[0],
            InferenceDevice::CUDA(_) => CUDA[0],
            InferenceDevice::TensorRT(_) => TENSOR_RT[0],
            InferenceDevice::CoreML(_) => CORE_ML[0],
        }
    }

    pub fn str_lowercase(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => CPU[1],
            InferenceDevice::CUDA(_) => CUDA[1],
            InferenceDevice::TensorRT(_) => TENSOR_RT[1],
            InferenceDevice::CoreML(_) => CORE_ML[1],
        }
    }

    pub fn device_id(&self) -> usize {
        match self {
            InferenceDevice::CPU => 0,
            InferenceDevice::CUDA(id) | InferenceDevice::TensorRT(id) | InferenceDevice::CoreML(id) => *id,
        }
    }

    pub fn all_inference_devices() -> Vec<String> {
        vec![
            CPU[1].to_string(),
            CUDA[1].to_string(),
            TENSOR_RT[1].to_string(),
            CORE_ML[1].to_string(),
        ]
    }

    pub fn is_valid_inference_device(inference_device: &str) -> bool {
        InferenceDevice::from_str(inference_device, 0).is_some()
    }
}

impl std::fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceDevice::CPU => write!(f, "{}", self.str()),
            _ => write!(f, "{}:{}", self.str(), self.device_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_names_case_insensitively() {
        assert_eq!(InferenceDevice::from_str("CUDA", 1), Some(InferenceDevice::CUDA(1)));
        assert_eq!(InferenceDevice::from_str("TensorRT", 0), Some(InferenceDevice::TensorRT(0)));
        assert_eq!(InferenceDevice::from_str("cpu", 3), Some(InferenceDevice::CPU));
        assert_eq!(InferenceDevice::from_str("rocm", 0), None);
    }

    #[test]
    fn every_listed_device_is_valid() {
        for name in InferenceDevice::all_inference_devices() {
            assert!(InferenceDevice::is_valid_inference_device(&name), "{name}");
        }
        assert_eq!(InferenceDevice::CUDA(2).to_string(), "CUDA:2");
        assert_eq!(InferenceDevice::CPU.to_string(), "CPU");
    }

    #[test]
    fn defaults_to_the_first_cuda_device() {
        assert_eq!(InferenceDevice::default(), InferenceDevice::CUDA(0));
        assert_eq!(crate::common::ModelConfig::new().inference_device, InferenceDevice::CUDA(0));
    }
}
