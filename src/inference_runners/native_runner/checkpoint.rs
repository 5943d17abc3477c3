//! Reads native checkpoints into named tensors.
//!
//! Two formats are understood: safetensors, whose header metadata may name the
//! architecture (a self-describing "full model"), and PyTorch pickles, which are
//! always treated as bare parameter mappings.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use safetensors::SafeTensors;

use crate::common::{BinError, Result};
use crate::inference_runners::native_runner::{open_clip, NativeArchitecture};

/// Metadata key a self-describing safetensors checkpoint stores its architecture under.
pub const ARCHITECTURE_KEY: &str = "architecture";

/// Containers training scripts commonly nest the state dict under.
const STATE_DICT_KEYS: [Option<&str>; 3] = [Some("model_state_dict"), Some("state_dict"), None];

/// Wrapper prefixes added by `DataParallel` and trainer modules.
const STRIPPED_PREFIXES: [&str; 2] = ["module.", "model."];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    SafeTensors,
    Pickle,
}

impl CheckpointFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "safetensors" => Ok(CheckpointFormat::SafeTensors),
            "pt" | "pth" | "bin" | "ckpt" => Ok(CheckpointFormat::Pickle),
            _ => Err(BinError::ModelLoad(format!(
                "unsupported checkpoint format for the native runtime: {}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug)]
pub struct Checkpoint {
    pub format: CheckpointFormat,
    pub tensors: HashMap<String, Tensor>,
    /// Set only when the checkpoint describes its own architecture.
    pub architecture: Option<NativeArchitecture>,
}

impl Checkpoint {
    pub fn open(path: &Path, device: &Device) -> Result<Self> {
        match CheckpointFormat::from_path(path)? {
            CheckpointFormat::SafeTensors => Self::open_safetensors(path, device),
            CheckpointFormat::Pickle => Self::open_pickle(path, device),
        }
    }

    fn open_safetensors(path: &Path, device: &Device) -> Result<Self> {
        let buffer = std::fs::read(path)
            .map_err(|e| BinError::ModelLoad(format!("{}: {e}", path.display())))?;
        let (_, metadata) = SafeTensors::read_metadata(&buffer)
            .map_err(|e| BinError::ModelLoad(format!("malformed safetensors header: {e:?}")))?;

        let architecture = match metadata.metadata().as_ref().and_then(|m| m.get(ARCHITECTURE_KEY)) {
            Some(name) => Some(NativeArchitecture::from_str(name).ok_or_else(|| {
                BinError::ModelLoad(format!("checkpoint names an unknown architecture: {name}"))
            })?),
            None => None,
        };

        let tensors = candle_core::safetensors::load_buffer(&buffer, device)
            .map_err(|e| BinError::ModelLoad(format!("failed to read tensors: {e}")))?;

        Ok(Self {
            format: CheckpointFormat::SafeTensors,
            tensors: canonical_names(tensors)?,
            architecture,
        })
    }

    fn open_pickle(path: &Path, device: &Device) -> Result<Self> {
        let mut last_err = None;
        for key in STATE_DICT_KEYS {
            match candle_core::pickle::read_all_with_key(path, key) {
                Ok(tensors) if !tensors.is_empty() => {
                    log::info!(
                        "Read {} tensors from {} (container: {})",
                        tensors.len(),
                        path.display(),
                        key.unwrap_or("<root>")
                    );
                    let tensors = tensors
                        .into_iter()
                        .map(|(name, t)| t.to_device(device).map(|t| (name, t)))
                        .collect::<candle_core::Result<HashMap<_, _>>>()
                        .map_err(|e| BinError::ModelLoad(e.to_string()))?;
                    return Ok(Self {
                        format: CheckpointFormat::Pickle,
                        tensors: canonical_names(tensors)?,
                        architecture: None,
                    });
                }
                Ok(_) => {}
                Err(err) => last_err = Some(err),
            }
        }

        Err(BinError::ModelLoad(format!(
            "{} holds no tensors; a pickled module object cannot be executed outside Python, \
            export its state dict or a safetensors file instead{}",
            path.display(),
            last_err.map(|e| format!(" ({e})")).unwrap_or_default()
        )))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// Strips wrapper prefixes, then converts open_clip names to the Hugging Face layout.
fn canonical_names(tensors: HashMap<String, Tensor>) -> Result<HashMap<String, Tensor>> {
    let tensors = strip_prefixes(tensors);
    if !open_clip::is_open_clip(&tensors) {
        return Ok(tensors);
    }
    log::info!("Converting open_clip parameter names ({} tensors)", tensors.len());
    open_clip::remap(tensors)
        .map_err(|e| BinError::ModelLoad(format!("cannot convert open_clip checkpoint: {e}")))
}

fn strip_prefixes(tensors: HashMap<String, Tensor>) -> HashMap<String, Tensor> {
    tensors
        .into_iter()
        .map(|(name, tensor)| {
            let stripped = STRIPPED_PREFIXES
                .iter()
                .find_map(|p| name.strip_prefix(p))
                .map(str::to_string)
                .unwrap_or(name);
            (stripped, tensor)
        })
        .collect()
}
