use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use scanline_core::Detection;
use scanline_ocr::{ExtractionPipeline, MockRecognizer, RecognizeError, TextRecognizer};
use scanline_server::{router, AppState};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "scanline-test-boundary";
const LIMIT: usize = 10 * 1024 * 1024;

struct FailingRecognizer;

impl TextRecognizer for FailingRecognizer {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<Detection>, RecognizeError> {
        Err(RecognizeError::Engine("model unavailable".to_string()))
    }
}

fn tiny_png() -> Vec<u8> {
    let img: GrayImage = ImageBuffer::from_fn(6, 4, |x, _| Luma([(x * 40) as u8]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn detections() -> Vec<Detection> {
    vec![
        Detection::from_rect("Foo", 0.0, 40.0, 30.0, 20.0),
        Detection::from_rect("World", 60.0, 2.0, 50.0, 20.0),
        Detection::from_rect("Hello", 0.0, 0.0, 50.0, 20.0),
    ]
}

fn app_with(recognizer: Box<dyn TextRecognizer>, scratch: &Path) -> Router {
    app_limited(recognizer, scratch, LIMIT)
}

fn app_limited(recognizer: Box<dyn TextRecognizer>, scratch: &Path, limit: usize) -> Router {
    let pipeline = ExtractionPipeline::new(recognizer, scratch.to_path_buf());
    router(AppState::new(Arc::new(pipeline)), limit)
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}

/// Valid PNG framing around a header that declares a huge RGB image.
fn huge_png() -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    let mut push = |kind: &[u8; 4], data: &[u8]| {
        png.extend_from_slice(&(data.len() as u32).to_be_bytes());
        let start = png.len();
        png.extend_from_slice(kind);
        png.extend_from_slice(data);
        let crc = crc32(&png[start..]);
        png.extend_from_slice(&crc.to_be_bytes());
    };
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&60_000u32.to_be_bytes());
    ihdr.extend_from_slice(&60_000u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
    push(b"IHDR", &ihdr);
    push(b"IDAT", &[0x78, 0x9c, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
    push(b"IEND", &[]);
    png
}

fn app(scratch: &Path) -> Router {
    app_with(Box::new(MockRecognizer::new(detections())), scratch)
}

fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/extract_text")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(json: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/extract_text")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn health_check() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(dir.path()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn json_base64_image_is_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let payload = serde_json::json!({ "image": STANDARD.encode(tiny_png()) });
    let (status, body) = send(app(dir.path()), json_request(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["extracted_text"], serde_json::json!(["Hello World", "Foo"]));
    assert_eq!(body["total_lines"], 2);
}

#[tokio::test]
async fn json_data_url_prefix_is_stripped() {
    let dir = tempfile::tempdir().unwrap();
    let image = format!("data:image/png;base64,{}", STANDARD.encode(tiny_png()));
    let (status, body) =
        send(app(dir.path()), json_request(serde_json::json!({ "image": image }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_lines"], 2);
}

#[tokio::test]
async fn multipart_upload_is_extracted_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(multipart_body("image", "scan.png", &tiny_png()));
    let (status, body) = send(app(dir.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extracted_text"][0], "Hello World");
    assert_eq!(body["extracted_text"][1], "Foo");
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn multipart_without_image_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(multipart_body("document", "scan.png", &tiny_png()));
    let (status, body) = send(app(dir.path()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No image file provided");
}

#[tokio::test]
async fn multipart_with_empty_filename_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(multipart_body("image", "", &tiny_png()));
    let (status, body) = send(app(dir.path()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file selected");
}

#[tokio::test]
async fn json_without_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(app(dir.path()), json_request(serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image provided");
}

#[tokio::test]
async fn malformed_base64_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(dir.path()),
        json_request(serde_json::json!({ "image": "not-valid-base64!!!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("base64"));
}

#[tokio::test]
async fn undecodable_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let payload = serde_json::json!({ "image": STANDARD.encode(b"plain text, not pixels") });
    let (status, _) = send(app(dir.path()), json_request(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_content_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/extract_text")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let (status, _) = send(app(dir.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recognition_failure_is_server_error_and_temp_file_removed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Box::new(FailingRecognizer), dir.path());
    let request = multipart_request(multipart_body("image", "scan.png", &tiny_png()));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("OCR processing failed:"));
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn malformed_detection_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let broken = vec![Detection::new("ghost", Vec::<scanline_core::Point>::new())];
    let app = app_with(Box::new(MockRecognizer::new(broken)), dir.path());
    let payload = serde_json::json!({ "image": STANDARD.encode(tiny_png()) });
    let (status, body) = send(app, json_request(payload)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("empty polygon"));
}

#[tokio::test]
async fn empty_recognition_is_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Box::new(MockRecognizer::new(vec![])), dir.path());
    let payload = serde_json::json!({ "image": STANDARD.encode(tiny_png()) });
    let (status, body) = send(app, json_request(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extracted_text"], serde_json::json!([]));
    assert_eq!(body["total_lines"], 0);
}

#[tokio::test]
async fn image_over_decoder_limits_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let payload = serde_json::json!({ "image": STANDARD.encode(huge_png()) });
    let (status, body) = send(app(dir.path()), json_request(payload)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("OCR processing failed:"));
}

#[tokio::test]
async fn oversized_json_body_gets_json_413() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_limited(Box::new(MockRecognizer::new(detections())), dir.path(), 256);
    let payload = serde_json::json!({ "image": STANDARD.encode(vec![0u8; 4096]) });
    let (status, body) = send(app, json_request(payload)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn oversized_upload_gets_json_413_and_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_limited(Box::new(MockRecognizer::new(detections())), dir.path(), 256);
    let request = multipart_request(multipart_body("image", "scan.png", &vec![7u8; 4096]));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert_eq!(entries(dir.path()), 0);
}
