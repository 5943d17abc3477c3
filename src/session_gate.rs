//! One-time model initialization shared by every request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array;
use tokio::sync::OnceCell;

use crate::artifact;
use crate::common::{BinError, InferenceProcessor, ModelConfig, Result};
use crate::inference_runners::{load_backend, ForwardPass, X};

/// A loaded, ready-to-run model.
pub struct InferenceSession {
    backend: Box<dyn ForwardPass>,
    processor: InferenceProcessor,
    artifact: PathBuf,
    image_size: u32,
}

impl std::fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSession")
            .field("processor", &self.processor)
            .field("artifact", &self.artifact)
            .field("image_size", &self.image_size)
            .field("providers", &self.backend.providers())
            .finish()
    }
}

impl InferenceSession {
    pub fn new(
        backend: Box<dyn ForwardPass>,
        processor: InferenceProcessor,
        artifact: impl Into<PathBuf>,
        image_size: u32,
    ) -> Self {
        Self {
            backend,
            processor,
            artifact: artifact.into(),
            image_size,
        }
    }

    /// Loads the artifact at `artifact` and, if `config.dry_run` is set, pushes one
    /// blank batch through it.
    pub fn load(config: &ModelConfig, artifact: &Path) -> Result<Self> {
        let config = config.clone().with_model(&artifact.to_string_lossy());
        let backend = load_backend(&config)?;

        let image_size = match backend.input_size() {
            Some(declared) if declared as u32 != config.image_size => {
                log::warn!(
                    "Model declares a {declared}px input, overriding configured image size {}",
                    config.image_size
                );
                declared as u32
            }
            _ => config.image_size,
        };

        let session = Self::new(backend, config.inference_processor, artifact, image_size);
        if config.dry_run {
            session
                .dry_run()
                .map_err(|e| BinError::ModelLoad(format!("dry run failed: {e}")))?;
        }
        Ok(session)
    }

    fn dry_run(&self) -> Result<()> {
        let size = self.image_size as usize;
        let x = X::from(Array::zeros(vec![1, 3, size, size]));
        let ys = self.backend.run(&x)?;
        log::info!("Dry run ok, output shape {:?}", ys.shape());
        Ok(())
    }

    pub fn backend(&self) -> &dyn ForwardPass {
        self.backend.as_ref()
    }

    pub fn processor(&self) -> InferenceProcessor {
        self.processor
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    pub fn providers(&self) -> Vec<String> {
        self.backend.providers()
    }
}

/// Load-once guard around the [`InferenceSession`].
///
/// Concurrent callers of [`SessionGate::session`] wait on the same initialization;
/// a failed initialization is remembered as `None` and never retried.
#[derive(Debug)]
pub struct SessionGate {
    config: ModelConfig,
    cell: OnceCell<Option<Arc<InferenceSession>>>,
}

impl SessionGate {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// A gate whose initialization already happened, with `session` as its outcome.
    pub fn with_session(config: ModelConfig, session: Option<Arc<InferenceSession>>) -> Self {
        Self {
            config,
            cell: OnceCell::new_with(Some(session)),
        }
    }

    /// Returns the session, initializing it on first call.
    pub async fn session(&self) -> Option<Arc<InferenceSession>> {
        self.cell.get_or_init(|| self.initialize()).await.clone()
    }

    /// Returns the session only if initialization has already completed.
    pub fn loaded(&self) -> Option<Arc<InferenceSession>> {
        self.cell.get().cloned().flatten()
    }

    async fn initialize(&self) -> Option<Arc<InferenceSession>> {
        match self.try_initialize().await {
            Ok(session) => {
                log::info!(
                    "Model ready: {} via {} (providers: {:?})",
                    session.artifact().display(),
                    session.processor(),
                    session.providers()
                );
                Some(Arc::new(session))
            }
            Err(err) => {
                log::error!("{err}; serving without a model");
                None
            }
        }
    }

    async fn try_initialize(&self) -> Result<InferenceSession> {
        let path = artifact::ensure_artifact(
            Path::new(&self.config.weights_path),
            self.config.model_url.as_deref(),
            self.config.download_attempts,
        )
        .await?;

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || InferenceSession::load(&config, &path))
            .await
            .map_err(|e| BinError::ModelLoad(format!("loader task failed: {e}")))?
    }
}
