//! HTTP API tests driving the router with synthetic frame sources.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vframe_api::{create_router, ApiConfig, AppState};
use vframe_media::{OpaqueRemover, SyntheticOpener, SyntheticSource};
use vframe_queue::TaskRegistry;
use vframe_storage::{LocalStorage, StorageConfig};
use vframe_worker::{JobExecutor, ProcessingContext, WorkerConfig};

const BOUNDARY: &str = "vframe-test-boundary";
const FAKE_VIDEO: &[u8] = b"fake video bytes";
const NO_BYTES: &[u8] = b"";

struct TestApp {
    _tmp: TempDir,
    state: AppState,
    router: Router,
}

impl TestApp {
    async fn new(source: SyntheticSource) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(StorageConfig::under(tmp.path()));
        storage.ensure_dirs().await.unwrap();

        let ctx = ProcessingContext::new(
            Arc::new(TaskRegistry::new()),
            Arc::new(SyntheticOpener::new(source)),
            Arc::new(OpaqueRemover),
            storage,
        );
        let executor = JobExecutor::new(WorkerConfig::default(), ctx);
        let state = AppState::new(ApiConfig::default(), Arc::new(executor));
        let router = create_router(state.clone(), None);

        Self {
            _tmp: tmp,
            state,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn submit(&self, file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(file, fields)))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn submit_video(&self, fields: &[(&str, &str)]) -> String {
        let (status, body) = self.submit(Some(("clip.mp4", FAKE_VIDEO)), fields).await;
        assert_eq!(status, StatusCode::ACCEPTED, "{}", body);
        body["video_id"].as_str().unwrap().to_string()
    }

    async fn wait_terminal(&self, id: &str) -> Value {
        for _ in 0..500 {
            let (status, body) = self.get_json(&format!("/progress/{}", id)).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "completed" || body["status"] == "error" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }

    fn upload_count(&self) -> usize {
        std::fs::read_dir(&self.state.storage.config().upload_dir)
            .unwrap()
            .count()
    }
}

fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"video_file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn small_source() -> SyntheticSource {
    SyntheticSource::new(30.0, 90, 64, 48)
}

#[tokio::test]
async fn test_submit_and_complete() {
    let app = TestApp::new(small_source()).await;

    let id = app.submit_video(&[("interval", "1")]).await;
    let (status, body) = app.get_json(&format!("/progress/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(["pending", "processing", "completed"].contains(&body["status"].as_str().unwrap()));

    let done = app.wait_terminal(&id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], 100);
    assert_eq!(done["frames_count"], 3);
    assert_eq!(done["total_frames"], 90);
    assert!(done.get("error_message").is_none());

    let (status, frames) = app.get_json(&format!("/frames/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        frames["frames"],
        serde_json::json!(["frame_00000.png", "frame_00001.png", "frame_00002.png"])
    );

    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_download_archive() {
    let app = TestApp::new(small_source()).await;
    let id = app.submit_video(&[("output_format", "webp")]).await;
    app.wait_terminal(&id).await;

    let (status, headers, first) = app.get(&format!("/download/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION].to_str().unwrap(),
        format!("attachment; filename=\"frames_{}.zip\"", id)
    );

    let (_, _, second) = app.get(&format!("/download/{}", id)).await;
    assert_eq!(first, second);

    let archive = zip::ZipArchive::new(Cursor::new(first)).unwrap();
    let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["frame_00000.webp", "frame_00001.webp", "frame_00002.webp"]
    );
}

#[tokio::test]
async fn test_outputs_unavailable_before_completion() {
    let source = SyntheticSource::new(30.0, 600, 16, 16).with_frame_delay(Duration::from_millis(20));
    let app = TestApp::new(source).await;
    let id = app.submit_video(&[]).await;

    let (status, _, _) = app.get(&format!("/download/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = app.get(&format!("/frames/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.state.executor.shutdown();
}

#[tokio::test]
async fn test_serve_output() {
    let app = TestApp::new(small_source()).await;
    let id = app.submit_video(&[("output_format", "jpg"), ("target_width", "32")]).await;
    app.wait_terminal(&id).await;

    let (status, headers, bytes) = app.get(&format!("/outputs/{}/frame_00001.jpg", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
    assert!(!decoded.color().has_alpha());

    let (status, _, _) = app.get(&format!("/outputs/{}/frame_09999.jpg", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app
        .get(&format!("/outputs/{}/..%2F..%2Fuploads%2Fsecret.mp4", id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_submissions() {
    let app = TestApp::new(small_source()).await;
    let video: Option<(&str, &[u8])> = Some(("clip.mp4", FAKE_VIDEO));

    let cases: Vec<(Option<(&str, &[u8])>, Vec<(&str, &str)>)> = vec![
        (None, vec![]),
        (Some(("", FAKE_VIDEO)), vec![]),
        (Some(("clip.mp3", FAKE_VIDEO)), vec![]),
        (Some(("clip.mp4", NO_BYTES)), vec![]),
        (video, vec![("output_format", "gif")]),
        (video, vec![("output_format", "")]),
        (video, vec![("output_format", "PNG")]),
        (video, vec![("target_width", "0")]),
        (video, vec![("target_width", "wide")]),
        (video, vec![("interval", "-1")]),
        (video, vec![("interval", "0")]),
    ];

    for (file, fields) in cases {
        let (status, body) = app.submit(file, &fields).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{:?} {:?}", fields, body);
        assert!(body["detail"].is_string());
    }

    assert!(app.state.registry.is_empty());
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_accepts_uppercase_extension() {
    let app = TestApp::new(small_source()).await;
    let (status, body) = app.submit(Some(("My Clip.MOV", FAKE_VIDEO)), &[]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["video_id"].as_str().unwrap().to_string();
    assert_eq!(app.wait_terminal(&id).await["status"], "completed");
}

#[tokio::test]
async fn test_unknown_id() {
    let app = TestApp::new(small_source()).await;

    let (status, body) = app.get_json("/progress/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("nope"));

    for uri in ["/download/nope", "/frames/nope", "/outputs/nope/frame_00000.png"] {
        let (status, _, _) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let app = TestApp::new(small_source().fail_at(45)).await;
    let id = app.submit_video(&[]).await;

    let done = app.wait_terminal(&id).await;
    assert_eq!(done["status"], "error");
    assert_eq!(done["progress"], 100);
    assert!(done["error_message"].as_str().unwrap().contains("45"));

    let (status, _, _) = app.get(&format!("/download/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_submit_after_shutdown() {
    let app = TestApp::new(small_source()).await;
    app.state.executor.shutdown();

    let (status, _) = app.submit(Some(("clip.mp4", FAKE_VIDEO)), &[]).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new(small_source()).await;

    let (status, headers, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(headers.contains_key("x-request-id"));

    let (status, body) = app.get_json("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["background_remover"]["status"], "ok");
    assert_eq!(body["tasks"]["pending"], 0);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new(small_source()).await;
    let request = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-request-id"], "abc-123");
}
