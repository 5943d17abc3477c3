use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::manifest::Candidate;

/// One ranked row of an analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub asin: String,
    pub product: Option<String>,
    pub quantity: Value,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn new(candidate: &Candidate, score: f32) -> Self {
        Self {
            asin: candidate.id.clone(),
            product: candidate.display_name().map(str::to_string),
            quantity: candidate.attributes.quantity.clone(),
            score,
        }
    }

    /// NaN never outranks a real score.
    pub(crate) fn sort_key(&self) -> f32 {
        if self.score.is_nan() {
            f32::NEG_INFINITY
        } else {
            self.score
        }
    }
}
