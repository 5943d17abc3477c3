use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use ndarray::{Array, IxDyn};

use crate::common::{BinError, InferenceDevice, ModelConfig, Result};
use crate::inference_runners::backend::ForwardPass;
use crate::inference_runners::input_wrapper::X;
use crate::inference_runners::native_runner::{Checkpoint, ClipImageEncoder, NativeArchitecture};

/// candle backend.
///
/// The checkpoint is first treated as a full model (it names its own
/// architecture). Failing that it is a parameter mapping, which only runs when an
/// architecture has been configured externally.
pub struct NativeEngine {
    model: ClipImageEncoder,
    architecture: NativeArchitecture,
    device: Device,
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("architecture", &self.architecture)
            .field("device", &self.device)
            .finish()
    }
}

impl NativeEngine {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let path = Path::new(&config.weights_path);
        let device = Self::select_device(config.inference_device);
        let checkpoint = Checkpoint::open(path, &device)?;

        let architecture = match (checkpoint.architecture, config.native_architecture) {
            (Some(embedded), configured) => {
                if let Some(configured) = configured.filter(|c| *c != embedded) {
                    log::warn!(
                        "Checkpoint declares {embedded}, ignoring configured architecture {configured}"
                    );
                }
                log::info!("Loading {} as a full {} model", path.display(), embedded);
                embedded
            }
            (None, Some(configured)) => {
                log::info!(
                    "{} is a parameter mapping, binding it to {}",
                    path.display(),
                    configured
                );
                configured
            }
            (None, None) => {
                return Err(BinError::ModelLoad(format!(
                    "{} is a parameter mapping without an architecture and cannot be executed \
                    standalone; configure one of: {}",
                    path.display(),
                    NativeArchitecture::ClipVitB32.str()
                )))
            }
        };

        let tensor_count = checkpoint.len();
        let vb = VarBuilder::from_tensors(checkpoint.tensors, DType::F32, &device);
        let model = architecture
            .build(vb)
            .map_err(|e| BinError::ModelLoad(format!("{architecture} weights do not match: {e}")))?;

        log::info!(
            "Backend: candle | Device: {:?} | Architecture: {} | Tensors: {}",
            device,
            architecture,
            tensor_count
        );

        Ok(Self {
            model,
            architecture,
            device,
        })
    }

    fn select_device(requested: InferenceDevice) -> Device {
        match requested {
            InferenceDevice::CUDA(device_id) | InferenceDevice::TensorRT(device_id) => {
                match Device::new_cuda(device_id) {
                    Ok(device) => device,
                    Err(err) => {
                        log::warn!("CUDA device {device_id} unavailable ({err}), Using cpu");
                        Device::Cpu
                    }
                }
            }
            InferenceDevice::CoreML(_) => {
                log::warn!("CoreML is an ONNX Runtime provider, Using cpu");
                Device::Cpu
            }
            InferenceDevice::CPU => Device::Cpu,
        }
    }

    pub fn architecture(&self) -> NativeArchitecture {
        self.architecture
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl ForwardPass for NativeEngine {
    fn run(&self, x: &X) -> Result<Array<f32, IxDyn>> {
        x.ensure_nchw(self.architecture.image_size())?;

        let input = Tensor::from_vec(x.to_contiguous_vec(), x.shape(), &self.device)?;
        let output = self.model.forward(&input)?;

        let dims = output.dims().to_vec();
        let data = output.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(Array::from_shape_vec(IxDyn(&dims), data)?)
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.architecture.image_size())
    }
}
