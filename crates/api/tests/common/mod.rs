//! Shared helpers for the receiver integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use mjrelay_api::config::ServerConfig;
use mjrelay_api::router::build_app_router;
use mjrelay_api::state::AppState;
use mjrelay_store::JobRecordStore;

/// Router plus the store and temp directory behind it.
pub struct TestApp {
    pub app: Router,
    pub store: JobRecordStore,
    _dir: tempfile::TempDir,
}

/// Build a test `ServerConfig` pointing at `record_dir`.
pub fn test_config(record_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        record_dir: record_dir.to_path_buf(),
        request_timeout_secs: 30,
    }
}

/// Build the full application router over a fresh temp record directory.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = JobRecordStore::open(config.record_dir.clone()).unwrap();

    let state = AppState {
        store: store.clone(),
        config: Arc::new(config),
    };

    TestApp {
        app: build_app_router(state),
        store,
        _dir: dir,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post(app: Router, uri: &str, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", content_type)
            .body(body.into())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
