//! HTTP API tests against an in-process router with mock classifiers

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use ndarray::ArrayView4;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use paddy_scanner::labels::{AGE_DAYS, DISEASE_LABELS, NUM_AGE_BUCKETS, NUM_DISEASES, NUM_VARIETIES, VARIETY_LABELS};
use paddy_scanner::storage::InMemoryPredictionRepository;
use paddy_scanner::{
    build_router, AppState, BlobStore, Classifier, InferenceService, PaddyError, PredictionRecord,
    PredictionRepository, Result,
};

const BOUNDARY: &str = "paddyscannertestboundary";
const UPLOAD_LIMIT: usize = 1024 * 1024;

/// Puts most of the probability mass on one class
struct Peaked {
    classes: usize,
    winner: usize,
}

impl Classifier for Peaked {
    fn name(&self) -> &str {
        "peaked"
    }

    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        assert_eq!(input.shape()[3], 3);
        let rest = 0.1 / (self.classes - 1) as f32;
        let mut probabilities = vec![rest; self.classes];
        probabilities[self.winner] = 0.9;
        Ok(probabilities)
    }
}

struct Broken;

impl Classifier for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn predict(&self, _input: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        Err(PaddyError::Inference("session poisoned".to_string()))
    }
}

/// Remembers what it was asked to store, then fails
#[derive(Default)]
struct FailingRepository {
    attempted: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl PredictionRepository for FailingRepository {
    async fn insert(&self, record: &PredictionRecord) -> Result<()> {
        self.attempted.lock().unwrap().push(record.image_id);
        Err(PaddyError::Database("connection reset".to_string()))
    }

    async fn recent(&self, _limit: u32) -> Result<Vec<PredictionRecord>> {
        Ok(Vec::new())
    }
}

fn peaked_service() -> InferenceService {
    InferenceService::new(
        Arc::new(Peaked { classes: NUM_DISEASES, winner: 3 }),
        Arc::new(Peaked { classes: NUM_VARIETIES, winner: 6 }),
        Arc::new(Peaked { classes: NUM_AGE_BUCKETS, winner: 5 }),
    )
}

fn app_with(
    inference: InferenceService,
    blobs: BlobStore,
    records: Arc<dyn PredictionRepository>,
) -> Router {
    let state = Arc::new(AppState::new(Arc::new(inference), blobs, records));
    build_router(state, UPLOAD_LIMIT)
}

fn app() -> Router {
    app_with(
        peaked_service(),
        BlobStore::in_memory(),
        Arc::new(InMemoryPredictionRepository::new()),
    )
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 80, if x < width / 2 { 255 } else { 128 }])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn multipart(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn predict_png(app: &Router, data: &[u8]) -> Value {
    let request = upload_request("/api/predict/", multipart("file", "leaf.png", "image/png", data));
    let (status, json) = send_json(app, request).await;
    assert_eq!(status, StatusCode::OK, "unexpected response: {json}");
    json
}

#[tokio::test]
async fn test_index_and_health() {
    let app = app();

    let (status, json) = send_json(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "PaddyScannerAI API is running.");

    let (status, json) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], paddy_scanner::VERSION);
}

#[tokio::test]
async fn test_predict_rgba_upload() {
    let app = app();
    let json = predict_png(&app, &png(512, 256)).await;

    let disease = json["disease"]["label"].as_str().unwrap();
    assert!(DISEASE_LABELS.contains(&disease));
    assert_eq!(disease, DISEASE_LABELS[3]);

    let confidence = json["disease"]["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert!((confidence - 0.9).abs() < 1e-4);

    assert_eq!(json["variety"]["label"], VARIETY_LABELS[6]);
    assert_eq!(json["age"]["days"], AGE_DAYS[5]);
    assert!(Uuid::parse_str(json["image_id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_predict_without_trailing_slash() {
    let app = app();
    let request = upload_request("/api/predict", multipart("file", "leaf.png", "image/png", &png(64, 64)));
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_uploaded_image_roundtrip() {
    let app = app();
    let data = png(300, 200);
    let json = predict_png(&app, &data).await;
    let image_id = json["image_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/image/{image_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_image_lookup_errors() {
    let app = app();

    let (status, json) = send_json(&app, get("/api/image/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = send_json(&app, get(&format!("/api/image/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_newest_first() {
    let app = app();
    let first = predict_png(&app, &png(64, 64)).await;
    let second = predict_png(&app, &png(80, 64)).await;

    let (status, json) = send_json(&app, get("/api/history/")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["image_id"], second["image_id"]);
    assert_eq!(entries[1]["image_id"], first["image_id"]);
    assert_eq!(entries[0]["filename"], "leaf.png");
    assert_eq!(
        entries[0]["image_url"],
        format!("/api/image/{}", second["image_id"].as_str().unwrap())
    );

    let (status, json) = send_json(&app, get("/api/history?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_limit_bounds() {
    let app = app();
    for query in ["limit=0", "limit=101", "limit=abc", "limit=-1"] {
        let (status, json) = send_json(&app, get(&format!("/api/history/?{query}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert!(json["error"].is_string());
    }

    let (status, _) = send_json(&app, get("/api/history/?limit=100")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let app = app();

    let request = upload_request(
        "/api/predict/",
        multipart("file", "notes.txt", "text/plain", b"not an image"),
    );
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Declared as an image, but the bytes are not one
    let request = upload_request(
        "/api/predict/",
        multipart("file", "leaf.png", "image/png", b"definitely not a png"),
    );
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send_json(&app, get("/api/history/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_multipart_body_gets_json_error() {
    let app = app();
    for uri in ["/api/predict/", "/api/predict/disease", "/api/predict/variety", "/api/predict/age"] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, json) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(json["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_missing_or_empty_file_rejected() {
    let app = app();

    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes();
    let (status, _) = send_json(&app, upload_request("/api/predict/", body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    body = multipart("file", "leaf.png", "image/png", b"");
    let (status, _) = send_json(&app, upload_request("/api/predict/", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_any_named_file_field_accepted() {
    let app = app();
    let request = upload_request(
        "/api/predict/",
        multipart("image", "leaf.png", "application/octet-stream", &png(64, 64)),
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = app();
    let request = upload_request(
        "/api/predict/",
        multipart("file", "big.png", "image/png", &vec![0u8; UPLOAD_LIMIT + 1]),
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_record_failure_leaves_no_blob() {
    let blobs = BlobStore::in_memory();
    let records = Arc::new(FailingRepository::default());
    let app = app_with(peaked_service(), blobs.clone(), records.clone());

    let request = upload_request("/api/predict/", multipart("file", "leaf.png", "image/png", &png(64, 64)));
    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal server error");

    let attempted = records.attempted.lock().unwrap().clone();
    assert_eq!(attempted.len(), 1);
    assert!(matches!(blobs.get(attempted[0]).await, Err(PaddyError::NotFound(_))));
}

#[tokio::test]
async fn test_classifier_failure_stores_nothing() {
    let records = Arc::new(InMemoryPredictionRepository::new());
    let inference = InferenceService::new(
        Arc::new(Peaked { classes: NUM_DISEASES, winner: 0 }),
        Arc::new(Broken),
        Arc::new(Peaked { classes: NUM_AGE_BUCKETS, winner: 0 }),
    );
    let app = app_with(inference, BlobStore::in_memory(), records.clone());

    let request = upload_request("/api/predict/", multipart("file", "leaf.png", "image/png", &png(64, 64)));
    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal server error");
    assert!(records.is_empty().await);
}

#[tokio::test]
async fn test_single_task_endpoints() {
    let records = Arc::new(InMemoryPredictionRepository::new());
    let app = app_with(peaked_service(), BlobStore::in_memory(), records.clone());
    let data = png(200, 300);

    let request = upload_request("/api/predict/disease", multipart("file", "a.png", "image/png", &data));
    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["label"], DISEASE_LABELS[3]);

    let request = upload_request("/api/predict/variety", multipart("file", "a.png", "image/png", &data));
    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["label"], VARIETY_LABELS[6]);

    let request = upload_request("/api/predict/age", multipart("file", "a.png", "image/png", &data));
    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["days"], AGE_DAYS[5]);
    assert!((json["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-4);

    assert!(records.is_empty().await);
}
