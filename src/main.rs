//! Bin photo scoring server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bin_scan::common::{
    InferenceDevice, InferenceProcessor, ModelConfig, DEFAULT_DOWNLOAD_ATTEMPTS, DEFAULT_IMAGE_SIZE,
};
use bin_scan::inference_runners::{NativeArchitecture, DEFAULT_RESULT_LIMIT};
use bin_scan::server::{self, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "bin-scan-server")]
#[command(version)]
#[command(about = "Scores candidate products against a photo of a storage bin")]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Local path of the model artifact
    #[arg(long, env = "MODEL_PATH", default_value = "model.onnx")]
    model_path: String,

    /// Where to fetch the artifact from when it is missing locally
    #[arg(long, env = "MODEL_URL")]
    model_url: Option<String>,

    /// Inference backend: ort or native
    #[arg(long, env = "BIN_SCAN_BACKEND", default_value = "ort")]
    backend: String,

    /// Preferred device: cpu, cuda, tensorrt or coreml
    #[arg(long, env = "BIN_SCAN_DEVICE", default_value = "cuda")]
    device: String,

    /// Accelerator ordinal
    #[arg(long, default_value_t = 0)]
    device_id: usize,

    /// Path to the ONNX Runtime shared library
    #[arg(long, env = "ORT_DYLIB_PATH")]
    ort_lib_path: Option<String>,

    /// Architecture for native checkpoints that only hold parameters
    #[arg(long, env = "BIN_SCAN_ARCHITECTURE")]
    native_architecture: Option<String>,

    #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE)]
    image_size: u32,

    #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
    max_results: usize,

    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_ATTEMPTS)]
    download_retries: u32,

    /// Static dashboard served at /
    #[arg(long, default_value = "dashboard")]
    dashboard_dir: PathBuf,

    #[arg(long, default_value_t = server::state::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    #[arg(long, default_value_t = 30)]
    inference_timeout_secs: u64,

    /// Defer the model load to the first analysis request
    #[arg(long)]
    lazy_load: bool,

    /// Skip the warm-up forward pass after loading
    #[arg(long)]
    no_dry_run: bool,

    /// Log per-stage timings
    #[arg(long)]
    profile: bool,
}

impl Cli {
    fn model_config(&self) -> anyhow::Result<ModelConfig> {
        let processor = InferenceProcessor::from_str(&self.backend).with_context(|| {
            format!(
                "unknown backend {:?}, expected one of {:?}",
                self.backend,
                InferenceProcessor::all_inference_processors()
            )
        })?;
        let device = InferenceDevice::from_str(&self.device, self.device_id).with_context(|| {
            format!(
                "unknown device {:?}, expected one of {:?}",
                self.device,
                InferenceDevice::all_inference_devices()
            )
        })?;
        let architecture = match self.native_architecture.as_deref() {
            Some(name) => Some(
                NativeArchitecture::from_str(name)
                    .with_context(|| format!("unknown native architecture {name:?}"))?,
            ),
            None => None,
        };

        Ok(ModelConfig::new()
            .with_model(&self.model_path)
            .with_model_url(self.model_url.as_deref())
            .with_ort_lib_path(self.ort_lib_path.as_deref())
            .with_processor(processor)
            .with_device(device)
            .with_native_architecture(architecture)
            .with_image_size(self.image_size)
            .with_download_attempts(self.download_retries)
            .with_dry_run(!self.no_dry_run)
            .with_profile(self.profile))
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            max_results: self.max_results,
            max_upload_bytes: self.max_upload_bytes,
            inference_timeout: Duration::from_secs(self.inference_timeout_secs),
            dashboard_dir: self.dashboard_dir.clone(),
            profile: self.profile,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    log::info!("bin-scan-server v{}", env!("CARGO_PKG_VERSION"));

    let state = bin_scan::init_service(cli.model_config()?, cli.server_config(), cli.lazy_load).await;
    let app = server::router(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cli.host, cli.port))?;
    log::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
