//! Shared helpers for tests that need a live HTTP endpoint or scratch files.

use std::path::PathBuf;

use axum::Router;
use serde_json::Value;

use crate::api::ApiClient;
use crate::config::HttpTimeouts;

/// Serve `router` on an ephemeral local port and return its base URL.
pub(crate) async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client with short timeouts pointed at `base_url`.
pub(crate) fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, HttpTimeouts { request_secs: 2, connect_secs: 1 }).unwrap()
}

/// A URL nothing listens on.
pub(crate) async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Write `inventory` to a fresh temp file and return its path.
pub(crate) fn inventory_file(name: &str, inventory: &Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!("stock-alerts-inventory-{}-{name}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string(inventory).unwrap()).unwrap();
    path
}

pub(crate) fn sample_inventory() -> Value {
    serde_json::json!([
        {"id": 1, "peca": "Parafuso", "categoria": "Fixação", "qtd": 2, "qtd_min": 10},
        {"id": 2, "peca": "Correia", "categoria": "Transmissão", "qtd": 15, "qtd_min": 5},
        {"id": 3, "peca": "Rolamento", "categoria": null, "qtd": 4, "qtd_min": 4}
    ])
}
