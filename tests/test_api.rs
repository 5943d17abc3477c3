use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::{ArrayD, IxDyn};
use serde_json::{json, Value};
use tower::ServiceExt;

use bin_scan::common::{InferenceProcessor, ModelConfig, Result};
use bin_scan::inference_runners::{ForwardPass, X};
use bin_scan::server::{self, AppState, ServerConfig};
use bin_scan::session_gate::{InferenceSession, SessionGate};

const BOUNDARY: &str = "bin-scan-test-boundary";

/// Returns a fixed 512-wide embedding and counts calls.
#[derive(Default)]
struct CountingBackend {
    calls: Arc<AtomicUsize>,
}

impl ForwardPass for CountingBackend {
    fn run(&self, x: &X) -> Result<ArrayD<f32>> {
        assert_eq!(x.shape(), &[1, 3, 224, 224]);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ArrayD::from_elem(IxDyn(&[1, 512]), 0.5))
    }

    fn providers(&self) -> Vec<String> {
        vec!["CPUExecutionProvider".to_string()]
    }
}

fn server_config() -> ServerConfig {
    ServerConfig {
        dashboard_dir: "no-such-dashboard".into(),
        ..ServerConfig::default()
    }
}

fn app_with_backend(calls: Arc<AtomicUsize>) -> Router {
    let backend = CountingBackend { calls };
    let session = InferenceSession::new(Box::new(backend), InferenceProcessor::ORT, "stub.onnx", 224);
    let gate = SessionGate::with_session(ModelConfig::new(), Some(Arc::new(session)));
    server::router(Arc::new(AppState::new(Arc::new(gate), server_config())))
}

fn app_without_model() -> Router {
    let gate = SessionGate::with_session(ModelConfig::new(), None);
    server::router(Arc::new(AppState::new(Arc::new(gate), server_config())))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn multipart(fields: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        if *name == "image" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"image\"; filename=\"bin.png\"\r\nContent-Type: image/png\r\n\r\n",
            );
        } else {
            body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

const TWO_ITEMS: &str = r#"{"BIN_FCSKU_DATA": {
    "A1": {"normalizedName": "Widget", "quantity": 2},
    "A2": {"name": "Gadget", "quantity": 1}
}, "EXPECTED_QUANTITY": 3}"#;

#[tokio::test]
async fn health_reports_loaded_model() {
    let app = app_with_backend(Arc::default());
    let request = Request::get("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "model_loaded": true, "providers": ["CPUExecutionProvider"], "backend": "ort"})
    );
}

#[tokio::test]
async fn health_without_model() {
    let request = Request::get("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app_without_model(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], json!(false));
    assert_eq!(body["providers"], json!([]));
}

#[tokio::test]
async fn two_candidates_come_back_with_passthrough() {
    let calls = Arc::new(AtomicUsize::new(0));
    let image = png(640, 480);
    let request = multipart(&[("image", &image), ("bin_data", TWO_ITEMS.as_bytes())]);
    let (status, body) = send(app_with_backend(calls.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        body,
        json!({
            "results": [
                {"asin": "A1", "product": "Widget", "quantity": 2, "score": 0.0},
                {"asin": "A2", "product": "Gadget", "quantity": 1, "score": 0.0}
            ],
            "expected_quantity": 3
        })
    );
}

#[tokio::test]
async fn camel_case_field_name_is_accepted() {
    let image = png(32, 32);
    let request = multipart(&[("binData", TWO_ITEMS.as_bytes()), ("image", &image)]);
    let (status, body) = send(app_with_backend(Arc::default()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn no_model_echoes_expected_quantity() {
    let image = png(64, 64);
    let manifest = r#"{"BIN_FCSKU_DATA": {"A1": {"name": "Widget", "quantity": 5}}, "EXPECTED_QUANTITY": 5}"#;
    let request = multipart(&[("image", &image), ("bin_data", manifest.as_bytes())]);
    let (status, body) = send(app_without_model(), request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": "Model not loaded", "expected_quantity": 5}));
}

#[tokio::test]
async fn malformed_bin_data_is_rejected() {
    let image = png(64, 64);
    let request = multipart(&[("image", &image), ("bin_data", b"{not json")]);
    let (status, body) = send(app_with_backend(Arc::default()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body.get("results").is_none());
}

#[tokio::test]
async fn corrupt_image_never_reaches_the_backend() {
    let calls = Arc::new(AtomicUsize::new(0));
    let request = multipart(&[("image", b"\x89PNG garbage"), ("bin_data", TWO_ITEMS.as_bytes())]);
    let (status, body) = send(app_with_backend(calls.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid image"));
    assert_eq!(body["expected_quantity"], json!(3));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_field_is_a_bad_request() {
    let request = multipart(&[("bin_data", TWO_ITEMS.as_bytes())]);
    let (status, body) = send(app_with_backend(Arc::default()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing image or bin data"}));
}

#[tokio::test]
async fn oversized_upload_is_refused() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = CountingBackend { calls: calls.clone() };
    let session = InferenceSession::new(Box::new(backend), InferenceProcessor::ORT, "stub.onnx", 224);
    let gate = SessionGate::with_session(ModelConfig::new(), Some(Arc::new(session)));
    let config = ServerConfig {
        max_upload_bytes: 1024,
        ..server_config()
    };
    let app = server::router(Arc::new(AppState::new(Arc::new(gate), config)));

    let image = vec![0u8; 4096];
    let request = multipart(&[("image", &image), ("bin_data", TWO_ITEMS.as_bytes())]);
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dashboard_is_served_when_present() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>bins</h1>").unwrap();
    let gate = SessionGate::with_session(ModelConfig::new(), None);
    let config = ServerConfig {
        dashboard_dir: dir.path().to_path_buf(),
        ..ServerConfig::default()
    };
    let app = server::router(Arc::new(AppState::new(Arc::new(gate), config)));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<h1>bins</h1>");
}
