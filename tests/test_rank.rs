use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::json;

use bin_scan::common::{Candidate, CandidateManifest};
use bin_scan::inference_runners::{rank, PlaceholderScorer, DEFAULT_RESULT_LIMIT};

fn embedding() -> ArrayD<f32> {
    ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![0.1, 0.2, 0.3, 0.4]).unwrap()
}

fn manifest_of(n: usize) -> CandidateManifest {
    let entries: serde_json::Map<String, serde_json::Value> = (0..n)
        .map(|i| (format!("SKU{i:02}"), json!({ "name": format!("item {i}"), "quantity": i })))
        .collect();
    CandidateManifest::parse(&json!({ "BIN_FCSKU_DATA": entries }).to_string()).unwrap()
}

#[test]
fn ties_keep_manifest_order() {
    let manifest = manifest_of(25);
    let ranked = rank(embedding().view(), &manifest, &PlaceholderScorer, DEFAULT_RESULT_LIMIT);

    assert_eq!(ranked.len(), DEFAULT_RESULT_LIMIT);
    let ids: Vec<_> = ranked.iter().map(|r| r.asin.clone()).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("SKU{i:02}")).collect();
    assert_eq!(ids, expected);
}

#[test]
fn scores_come_out_descending() {
    let manifest = manifest_of(12);
    // Index-dependent score that is neither monotonic nor unique.
    let scorer = |out: ArrayViewD<'_, f32>, c: &Candidate| {
        let i: usize = c.id[3..].parse().unwrap();
        out[[0, i % 4]] * ((i % 3) as f32)
    };
    let ranked = rank(embedding().view(), &manifest, &scorer, 5);

    assert_eq!(ranked.len(), 5);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

    // Equal scores must still follow manifest order.
    for w in ranked.windows(2) {
        if w[0].score == w[1].score {
            assert!(w[0].asin < w[1].asin, "{} before {}", w[0].asin, w[1].asin);
        }
    }
}

#[test]
fn limit_bounds_and_empty_manifest() {
    let manifest = manifest_of(3);
    assert_eq!(rank(embedding().view(), &manifest, &PlaceholderScorer, 10).len(), 3);
    assert!(rank(embedding().view(), &manifest, &PlaceholderScorer, 0).is_empty());

    let empty = CandidateManifest::parse(r#"{"BIN_FCSKU_DATA": {}, "EXPECTED_QUANTITY": 2}"#).unwrap();
    assert!(rank(embedding().view(), &empty, &PlaceholderScorer, 10).is_empty());
}

#[test]
fn passthrough_fields_survive_ranking() {
    let manifest = CandidateManifest::parse(
        r#"{"BIN_FCSKU_DATA": {
            "B1": {"normalizedName": "Blue Mug", "name": "mug-blue", "quantity": "3"},
            "B2": {"quantity": null}
        }}"#,
    )
    .unwrap();
    let ranked = rank(embedding().view(), &manifest, &PlaceholderScorer, 10);

    assert_eq!(ranked[0].product.as_deref(), Some("Blue Mug"));
    assert_eq!(ranked[0].quantity, json!("3"));
    assert_eq!(ranked[1].product, None);
    assert_eq!(ranked[1].quantity, json!(null));
}
