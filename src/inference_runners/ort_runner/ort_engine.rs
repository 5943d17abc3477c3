//! ONNX Runtime backend.
//!
//! Execution providers are registered in preference order. An accelerator that
//! is missing or refuses to register is logged and skipped; the CPU provider is
//! always registered last so a session can still be built.

use anyhow::Result as AnyResult;
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
        TensorRTExecutionProvider,
    },
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
    tensor::TensorElementType,
    value::{DynValue, Value, ValueType},
};
use parking_lot::Mutex;

use crate::common::{BinError, InferenceDevice, ModelConfig, Result};
use crate::inference_runners::backend::ForwardPass;
use crate::inference_runners::input_wrapper::X;
use crate::utils::human_bytes;

pub(crate) const CROSS_MARK: &str = "❌";

/// Name, element type and declared dimensions of one graph input or output.
/// Dynamic dimensions are reported as `0`.
#[derive(Debug, Clone)]
pub struct OrtTensorAttr {
    pub name: String,
    pub dtype: TensorElementType,
    pub dims: Vec<usize>,
}

pub struct OrtEngine {
    session: Mutex<Session>,
    device: InferenceDevice,
    providers: Vec<String>,
    input: OrtTensorAttr,
    output: OrtTensorAttr,
}

impl std::fmt::Debug for OrtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEngine")
            .field("device", &self.device)
            .field("providers", &self.providers)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

impl OrtEngine {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Self::commit_environment(config).map_err(|e| BinError::ModelLoad(e.to_string()))?;

        let mut builder = Session::builder().map_err(load_err)?;
        let (device, providers) = Self::register_providers(&mut builder, config.inference_device)
            .map_err(|e| BinError::ModelLoad(e.to_string()))?;

        if config.profile {
            builder = builder.with_profiling("bin_scan_ort_profile").map_err(load_err)?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .commit_from_file(&config.weights_path)
            .map_err(load_err)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| BinError::ModelLoad("graph declares no inputs".to_string()))
            .and_then(|i| Self::tensor_attr(&i.name, &i.input_type))?;
        let output = session
            .outputs
            .first()
            .ok_or_else(|| BinError::ModelLoad("graph declares no outputs".to_string()))
            .and_then(|o| Self::tensor_attr(&o.name, &o.output_type))?;

        let size = std::fs::metadata(&config.weights_path).map(|m| m.len()).unwrap_or(0);
        log::info!(
            "Backend: ONNXRuntime | Device: {} | Providers: {:?} | Input: {} {:?} {:?} | Output: {} {:?} | Size: {}",
            device,
            providers,
            input.name,
            input.dtype,
            input.dims,
            output.name,
            output.dtype,
            human_bytes(size as f64),
        );

        Ok(Self {
            session: Mutex::new(session),
            device,
            providers,
            input,
            output,
        })
    }

    fn commit_environment(config: &ModelConfig) -> AnyResult<()> {
        match &config.ort_lib_path {
            Some(path) => {
                ort::init_from(path).with_name("bin_scan").commit()?;
            }
            None => {
                ort::init().with_name("bin_scan").commit()?;
            }
        }
        Ok(())
    }

    /// Registers the requested accelerator (if any) and then the CPU provider.
    /// Returns the device actually in use and the provider names in priority order.
    fn register_providers(
        builder: &mut SessionBuilder,
        requested: InferenceDevice,
    ) -> AnyResult<(InferenceDevice, Vec<String>)> {
        let mut device = requested;
        let mut providers = Vec::new();

        let accelerated = match requested {
            InferenceDevice::CUDA(device_id) => Self::build_cuda(builder, device_id),
            InferenceDevice::TensorRT(device_id) => Self::build_trt(builder, device_id),
            InferenceDevice::CoreML(_) => Self::build_coreml(builder),
            InferenceDevice::CPU => Ok(None),
        };
        match accelerated {
            Ok(Some(name)) => providers.push(name.to_string()),
            Ok(None) => {}
            Err(err) => {
                log::warn!("{err}, Using cpu");
                device = InferenceDevice::CPU;
            }
        }

        providers.push(Self::build_cpu(builder)?.to_string());
        Ok((device, providers))
    }

    fn build_trt(builder: &mut SessionBuilder, device_id: usize) -> AnyResult<Option<&'static str>> {
        let ep = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_engine_cache(true)
            .with_engine_cache_path("trt-cache");
        Self::register(builder, ep, "TensorRT")
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> AnyResult<Option<&'static str>> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        Self::register(builder, ep, "CUDA")
    }

    fn build_coreml(builder: &mut SessionBuilder) -> AnyResult<Option<&'static str>> {
        let ep = CoreMLExecutionProvider::default().with_subgraphs(false);
        Self::register(builder, ep, "CoreML")
    }

    fn build_cpu(builder: &mut SessionBuilder) -> AnyResult<&'static str> {
        let ep = CPUExecutionProvider::default();
        let name = ep.name();
        match ep.register(builder) {
            Ok(_) => Ok(name),
            Err(err) => anyhow::bail!("{CROSS_MARK} CPU initialization failed: {:?}", err),
        }
    }

    fn register<E: ExecutionProvider>(
        builder: &mut SessionBuilder,
        ep: E,
        label: &str,
    ) -> AnyResult<Option<&'static str>> {
        if !ep.is_available()? {
            anyhow::bail!("{CROSS_MARK} {label} execution provider not available");
        }
        match ep.register(builder) {
            Ok(_) => {
                if label == "TensorRT" {
                    log::info!("Initial model serialization with TensorRT may take some time...");
                }
                Ok(Some(ep.name()))
            }
            Err(err) => anyhow::bail!("{CROSS_MARK} {label} initialization failed: {:?}", err),
        }
    }

    fn tensor_attr(name: &str, value_type: &ValueType) -> Result<OrtTensorAttr> {
        match value_type {
            ValueType::Tensor { ty, shape, .. } => Ok(OrtTensorAttr {
                name: name.to_string(),
                dtype: *ty,
                dims: shape.iter().map(|&d| if d < 0 { 0 } else { d as usize }).collect(),
            }),
            other => Err(BinError::ModelLoad(format!(
                "{name} is not a tensor ({other:?})"
            ))),
        }
    }

    fn tensor_preprocess(x: &X, dtype: &TensorElementType) -> Result<DynValue> {
        let value = match dtype {
            TensorElementType::Float32 => Value::from_array(x.0.clone())?.into_dyn(),
            TensorElementType::Float64 => Value::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            TensorElementType::Float16 => Value::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Value::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            other => {
                return Err(BinError::Inference(format!(
                    "unsupported image input element type: {other:?}"
                )))
            }
        };
        Ok(value)
    }

    fn tensor_postprocess(x: &DynValue, dtype: &TensorElementType) -> Result<Array<f32, IxDyn>> {
        fn extract<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            let view = x.try_extract_array::<T>()?;
            Ok(view.mapv(map_fn).into_owned())
        }

        match dtype {
            TensorElementType::Float32 => extract::<f32>(x, |x| x),
            TensorElementType::Float16 => extract::<f16>(x, f16::to_f32),
            TensorElementType::Bfloat16 => extract::<bf16>(x, bf16::to_f32),
            TensorElementType::Float64 => extract::<f64>(x, |x| x as f32),
            TensorElementType::Int64 => extract::<i64>(x, |x| x as f32),
            TensorElementType::Int32 => extract::<i32>(x, |x| x as f32),
            TensorElementType::Int16 => extract::<i16>(x, |x| x as f32),
            TensorElementType::Int8 => extract::<i8>(x, |x| x as f32),
            TensorElementType::Uint64 => extract::<u64>(x, |x| x as f32),
            TensorElementType::Uint32 => extract::<u32>(x, |x| x as f32),
            TensorElementType::Uint16 => extract::<u16>(x, |x| x as f32),
            TensorElementType::Uint8 => extract::<u8>(x, |x| x as f32),
            TensorElementType::Bool => extract::<bool>(x, |x| x as u8 as f32),
            _ => Err(BinError::Inference(format!("Unsupported ort tensor type: {:?}", dtype))),
        }
    }

    pub fn engine_run(&self, x: &X) -> Result<Array<f32, IxDyn>> {
        let value = Self::tensor_preprocess(x, &self.input.dtype)?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![self.input.name.as_str() => value])?;
        Self::tensor_postprocess(&outputs[self.output.name.as_str()], &self.output.dtype)
    }
}

impl ForwardPass for OrtEngine {
    fn run(&self, x: &X) -> Result<Array<f32, IxDyn>> {
        self.engine_run(x)
    }

    fn providers(&self) -> Vec<String> {
        self.providers.clone()
    }

    /// Static spatial size of the input, when the graph declares one.
    fn input_size(&self) -> Option<usize> {
        match self.input.dims.as_slice() {
            [_, _, h, w] if *h > 0 && h == w => Some(*h),
            _ => None,
        }
    }
}

fn load_err(err: ort::Error) -> BinError {
    BinError::ModelLoad(err.to_string())
}
