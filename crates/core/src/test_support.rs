//! Local mock components for probe and scheduler tests.

use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
use std::{net::SocketAddr, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};

/// A throwaway HTTP service on a random local port.
///
/// - `/health` answers 200 with a JSON health document
/// - `/plain` answers 200 with a non-JSON body
/// - `/error` answers 503
/// - `/large` answers 200 with a JSON health document padded past 64 KiB
/// - `/delay/{ms}` answers 200 after sleeping `ms` milliseconds
pub struct MockService {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockService {
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/health", get(health))
            .route("/plain", get(|| async { "ok" }))
            .route("/error", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }))
            .route("/large", get(large))
            .route("/delay/{ms}", get(delay));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "mock",
        "status": "healthy",
        "version": "1.0.0",
        "metadata": {
            "instance_id": "mock-1",
            "region": "us-west-2"
        },
        "metrics": {
            "requests_per_second": 42.5,
            "error_rate": 0.01
        }
    }))
}

async fn large() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "metadata": { "padding": "x".repeat(128 * 1024) },
        "metrics": { "requests_per_second": 42.5 }
    }))
}

async fn delay(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "ok"
}

/// A URL on a local port nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/health", addr)
}
