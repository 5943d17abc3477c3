use std::cmp::Ordering;

use ndarray::ArrayViewD;

use crate::common::{Candidate, CandidateManifest, ScoredCandidate};

/// Default number of ranked rows returned per analysis.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Maps the raw model output to a relevance score for one candidate.
///
/// Called once per candidate with the same output view.
pub trait Scorer: Send + Sync {
    fn score(&self, output: ArrayViewD<'_, f32>, candidate: &Candidate) -> f32;
}

impl<F> Scorer for F
where
    F: Fn(ArrayViewD<'_, f32>, &Candidate) -> f32 + Send + Sync,
{
    fn score(&self, output: ArrayViewD<'_, f32>, candidate: &Candidate) -> f32 {
        self(output, candidate)
    }
}

/// Scores every candidate as `0.0`, leaving the manifest order untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderScorer;

impl Scorer for PlaceholderScorer {
    fn score(&self, _output: ArrayViewD<'_, f32>, _candidate: &Candidate) -> f32 {
        0.0
    }
}

/// Scores each candidate, sorts descending and keeps the first `limit`.
///
/// The sort is stable, so equal scores stay in manifest order.
pub fn rank(
    output: ArrayViewD<'_, f32>,
    manifest: &CandidateManifest,
    scorer: &dyn Scorer,
    limit: usize,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = manifest
        .iter()
        .map(|candidate| ScoredCandidate::new(candidate, scorer.score(output.view(), candidate)))
        .collect();

    scored.sort_by(|a, b| {
        b.sort_key()
            .partial_cmp(&a.sort_key())
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn manifest(ids: &[&str]) -> CandidateManifest {
        let body = ids
            .iter()
            .map(|id| format!("\"{id}\":{{\"name\":\"{id}-name\",\"quantity\":1}}"))
            .collect::<Vec<_>>()
            .join(",");
        CandidateManifest::parse(&format!("{{\"BIN_FCSKU_DATA\":{{{body}}}}}")).unwrap()
    }

    #[test]
    fn nan_sorts_last_and_signed_zeros_tie() {
        let output = ArrayD::<f32>::zeros(IxDyn(&[1, 4]));
        let scorer = |_: ArrayViewD<'_, f32>, c: &Candidate| match c.id.as_str() {
            "nan" => f32::NAN,
            "neg" => -0.0,
            _ => 0.0,
        };
        let ranked = rank(output.view(), &manifest(&["nan", "neg", "pos"]), &scorer, 10);
        let ids: Vec<_> = ranked.iter().map(|r| r.asin.as_str()).collect();
        assert_eq!(ids, ["neg", "pos", "nan"]);
    }

    #[test]
    fn placeholder_keeps_manifest_order() {
        let output = ArrayD::<f32>::zeros(IxDyn(&[1, 512]));
        let ranked = rank(output.view(), &manifest(&["z", "a", "m"]), &PlaceholderScorer, 2);
        let ids: Vec<_> = ranked.iter().map(|r| r.asin.as_str()).collect();
        assert_eq!(ids, ["z", "a"]);
        assert!(ranked.iter().all(|r| r.score == 0.0));
    }
}
