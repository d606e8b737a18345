//! Alert endpoint server.
//!
//! SYSTEM CONTEXT
//! ==============
//! Serves the two read endpoints the poller and report cache consume,
//! backed by a JSON inventory file instead of a database. The file is
//! re-read on every request so edits show up on the next poll tick.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::alerts::{ServerAlert, StockItem, low_stock_alerts};
use crate::api::{STOCK_ALERTS_PATH, STOCK_PATH};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("inventory file {path} unreadable: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("inventory file {path} invalid: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        error!(error = %self, "inventory load failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "erro": self.to_string() }))).into_response()
    }
}

/// Read the inventory file: a JSON array of `/peca` rows.
pub fn load_inventory(path: &Path) -> Result<Vec<StockItem>, InventoryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| InventoryError::Read { path: path.to_owned(), source })?;
    serde_json::from_str(&raw).map_err(|source| InventoryError::Parse { path: path.to_owned(), source })
}

#[derive(Clone)]
pub struct InventoryState {
    path: Arc<PathBuf>,
}

impl InventoryState {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()) }
    }
}

pub fn app(state: InventoryState) -> Router {
    Router::new()
        .route(STOCK_ALERTS_PATH, get(list_stock_alerts))
        .route(STOCK_PATH, get(list_stock))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /notificacoes-estoque`: items at or below their minimum.
async fn list_stock_alerts(State(state): State<InventoryState>) -> Result<Json<Vec<ServerAlert>>, InventoryError> {
    let items = load_inventory(&state.path)?;
    Ok(Json(low_stock_alerts(&items)))
}

/// `GET /peca`: every inventory row.
async fn list_stock(State(state): State<InventoryState>) -> Result<Json<Vec<StockItem>>, InventoryError> {
    Ok(Json(load_inventory(&state.path)?))
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
