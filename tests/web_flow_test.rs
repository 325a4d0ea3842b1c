//! Integration tests for the web layer: submission, status polling, queue
//! inspection, and one-shot download.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blogpack::config::Config;
use blogpack::jobs::JobStore;
use blogpack::web::{create_app, AppState};

fn test_app(work_dir: &std::path::Path) -> Router {
    let mut config = Config::for_testing();
    config.work_dir = work_dir.to_path_buf();
    let state = AppState {
        jobs: JobStore::new(config.clone()),
        config: Arc::new(config),
    };
    create_app(state)
}

async fn request_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn test_healthz() {
    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());
    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_submit_rejects_empty_url() {
    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());
    let (status, body) = request_json(
        &app,
        post_json("/process", &json!({"url": "", "formats": ["html"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "URL is required");
}

#[tokio::test]
async fn test_submit_rejects_unknown_format() {
    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());
    let (status, _) = request_json(
        &app,
        post_json(
            "/process",
            &json!({"url": "https://example.com", "formats": ["docx"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_unknown_job_is_404() {
    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());
    let (status, _) = request_json(
        &app,
        get("/status/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_queue_starts_empty() {
    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());
    let (status, body) = request_json(&app, get("/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processing"], 0);
    assert_eq!(body["queued"], 0);
    assert_eq!(body["total"], 0);
}

/// Full flow: submit a mock Ghost blog, poll to completion, download the
/// bundle once, and verify the second download fails.
#[tokio::test]
async fn test_submit_poll_download_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><meta name="generator" content="Ghost 5.0"></head></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    let sitemap = format!(
        r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{0}/hello/</loc></url>
</urlset>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/sitemap-posts.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "text/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hello/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><meta name="author" content="Jane"></head><body>
               <article><h1>Hello</h1>
               <div class="gh-content"><p>Hi there.</p></div></article>
               </body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());

    let (status, body) = request_json(
        &app,
        post_json(
            "/process",
            &json!({
                "url": format!("{}/", server.uri()),
                "formats": ["html", "epub"],
                "max_posts": 10
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().expect("job id").to_string();

    // Poll until the job reaches a terminal state.
    let mut last = Value::Null;
    for _ in 0..100 {
        let (status, snapshot) = request_json(&app, get(&format!("/status/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        last = snapshot;
        match last["status"].as_str() {
            Some("complete" | "error") => break,
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    assert_eq!(last["status"], "complete", "job did not complete: {last}");
    assert_eq!(last["download_ready"], true);

    // First download succeeds and returns a ZIP.
    let response = app
        .clone()
        .oneshot(get(&format!("/download/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/zip")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"PK"), "bundle is not a ZIP");

    // Download is a one-shot, destructive read.
    let (status, _) = request_json(&app, get(&format!("/download/{job_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = request_json(&app, get(&format!("/status/{job_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_before_completion_is_rejected() {
    let server = MockServer::start().await;
    // A homepage that stalls long enough for the job to still be running.
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_raw(
                    r#"<meta name="generator" content="Ghost 5.0">"#,
                    "text/html",
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-posts.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let app = test_app(temp.path());

    let (status, body) = request_json(
        &app,
        post_json(
            "/process",
            &json!({"url": format!("{}/", server.uri()), "formats": ["html"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = request_json(&app, get(&format!("/download/{job_id}"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Job not complete");
}
