#![allow(dead_code)]

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use metrix_common::CollectionStore;
use metrix_server::app;
use metrix_server::state::AppState;
use metrix_storage::SnapshotStore;
use serde_json::Value;
use std::io::{Read, Write};
use std::sync::Arc;
use tower::util::ServiceExt;

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context() -> TestContext {
    build_context(None)
}

pub fn build_test_context_with_backend(backend: Arc<dyn SnapshotStore>) -> TestContext {
    build_context(Some(backend))
}

fn build_context(backend: Option<Arc<dyn SnapshotStore>>) -> TestContext {
    let state = AppState::new(Arc::new(CollectionStore::new()), backend);
    let app = app::build_http_app(state.clone());
    TestContext { state, app }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response should be JSON")
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.headers.get("x-trace-id").and_then(|h| h.to_str().ok())
    }
}

pub async fn send(app: &axum::Router, req: Request<Body>) -> TestResponse {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn post_empty(app: &axum::Router, uri: &str) -> TestResponse {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

pub async fn get(app: &axum::Router, uri: &str) -> TestResponse {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

pub async fn post_json(app: &axum::Router, uri: &str, body: Value) -> TestResponse {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &axum::Router, uri: &str, body: impl Into<Body>) -> TestResponse {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(body.into())
        .expect("request should build");
    send(app, req).await
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip should encode");
    encoder.finish().expect("gzip should finish")
}

pub fn gunzip(bytes: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut out)
        .expect("gzip should decode");
    out
}
