//! HTTP surface served by `build_router`, backed by a mocked Marathon.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use httpmock::prelude::*;
use tokio::net::TcpListener;

use marathon_exporter_server::app_state::AppState;
use marathon_exporter_server::config::{ExporterConfig, SourceConfig};
use marathon_exporter_server::exporter::Exporter;
use marathon_exporter_server::router::build_router;

async fn marathon() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/metrics");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"version":"4.0.0","counters":{"foo":{"count":3}}}"#);
        })
        .await;
    server
}

/// Serve the exporter on an ephemeral port and return its base URL.
async fn serve(source: &MockServer, metrics_path: &str) -> String {
    let mut cfg = ExporterConfig::empty();
    cfg.exporter.metrics_path = metrics_path.to_string();
    cfg.sources.push(SourceConfig::new(source.base_url()));
    cfg.validate().unwrap();

    let exporter = Exporter::from_config(&cfg).unwrap();
    let app = build_router(AppState::new(exporter, &cfg.exporter.metrics_path));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn landing_page_links_metrics_path() {
    let source = marathon().await;
    let base = serve(&source, "/metrics").await;

    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<a href='/metrics'>Metrics</a>"));
}

#[tokio::test]
async fn healthz_is_ok() {
    let source = marathon().await;
    let base = serve(&source, "/metrics").await;

    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn metrics_are_prometheus_text() {
    let source = marathon().await;
    let base = serve(&source, "/metrics").await;

    let resp = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let body = resp.text().await.unwrap();
    assert!(body.contains("# TYPE marathon_foo counter\n"));
    assert!(body.contains("marathon_up{instance="));
}

#[tokio::test]
async fn custom_metrics_path_is_routed() {
    let source = marathon().await;
    let base = serve(&source, "/custom/metrics").await;

    let resp = reqwest::get(format!("{base}/custom/metrics")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("marathon_foo"));

    let resp = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let body = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
    assert!(body.contains("<a href='/custom/metrics'>Metrics</a>"));
}
