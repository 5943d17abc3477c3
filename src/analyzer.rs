use std::sync::Arc;
use std::time::Instant;

use ndarray::ArrayD;

use crate::common::{BinError, BinImage, CandidateManifest, Result, ScoredCandidate};
use crate::inference_runners::{image_ops, rank, InferenceProcess, Scorer, X};
use crate::session_gate::InferenceSession;

/// One analysis request: the uploaded photo and the parsed manifest.
#[derive(Debug, Clone)]
pub struct BinPhoto {
    pub image: Vec<u8>,
    pub manifest: CandidateManifest,
}

/// Scores a bin photo against its manifest with a loaded session.
pub struct BinAnalyzer {
    session: Arc<InferenceSession>,
    scorer: Arc<dyn Scorer>,
    limit: usize,
    deadline: Option<Instant>,
}

impl BinAnalyzer {
    pub fn new(session: Arc<InferenceSession>, scorer: Arc<dyn Scorer>, limit: usize) -> Self {
        Self {
            session,
            scorer,
            limit,
            deadline: None,
        }
    }

    /// Skips the forward pass when `deadline` has already passed by the time
    /// preprocessing is done. A forward pass that has started always runs to the end.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl InferenceProcess for BinAnalyzer {
    type Input = BinPhoto;
    type Output = Vec<ScoredCandidate>;

    fn preprocess(&self, input: &BinPhoto) -> Result<X> {
        let image = BinImage::decode(&input.image)?;
        log::debug!("Decoded {}x{} upload", image.width(), image.height());
        image_ops::preprocess(image, self.session.image_size())
    }

    fn inference(&self, x: X) -> Result<ArrayD<f32>> {
        if let Some(deadline) = self.deadline.filter(|d| Instant::now() >= *d) {
            return Err(BinError::Inference(format!(
                "deadline passed {:?} before the forward pass",
                deadline.elapsed()
            )));
        }
        self.session.backend().run(&x)
    }

    fn postprocess(&self, ys: ArrayD<f32>, input: &BinPhoto) -> Result<Vec<ScoredCandidate>> {
        Ok(rank(ys.view(), &input.manifest, self.scorer.as_ref(), self.limit))
    }
}
