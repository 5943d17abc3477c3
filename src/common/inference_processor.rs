/// Which runtime executes the forward pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InferenceProcessor {
    /// ONNX Runtime over an exported computation graph.
    #[default]
    ORT,
    /// candle over a checkpoint (full model or parameter mapping).
    Native,
}

// Hardcoded processor names. Storing the "proper" spelling and the lowercase version.
static ORT: [&str; 2] = ["ORT", "ort"];
static NATIVE: [&str; 2] = ["Native", "native"];

impl InferenceProcessor {
    pub fn from_str(infer_lang: &str) -> Option<Self> {
        match infer_lang.to_lowercase().as_str() {
            "ort" | "onnx" => Some(InferenceProcessor::ORT),
            "native" | "candle" => Some(InferenceProcessor::Native),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceProcessor::ORT => ORT[0],
            InferenceProcessor::Native => NATIVE[0],
        }
    }

    pub fn str_lowercase(&self) -> &'static str {
        match self {
            InferenceProcessor::ORT => ORT[1],
            InferenceProcessor::Native => NATIVE[1],
        }
    }

    pub fn all_inference_processors() -> Vec<String> {
        vec![ORT[1].to_string(), NATIVE[1].to_string()]
    }

    pub fn is_valid_inference_processor(inference_processor: &str) -> bool {
        InferenceProcessor::from_str(inference_processor).is_some()
    }
}

impl std::fmt::Display for InferenceProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_processor() {
        assert_eq!(InferenceProcessor::from_str("ONNX"), Some(InferenceProcessor::ORT));
        assert_eq!(InferenceProcessor::from_str("candle"), Some(InferenceProcessor::Native));
        assert_eq!(InferenceProcessor::from_str("python"), None);
        assert!(InferenceProcessor::all_inference_processors()
            .iter()
            .all(|p| InferenceProcessor::is_valid_inference_processor(p)));
    }
}
