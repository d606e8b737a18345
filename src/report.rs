//! Stock report cache.
//!
//! The reports page snapshots the inventory into the store under `estoque`
//! and renders from the snapshot. Deep links from the notification feed
//! resolve against the same snapshot.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alerts::StockItem;
use crate::api::{ApiClient, ApiError};
use crate::store::Store;

pub const STOCK_REPORT_KEY: &str = "estoque";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReportRow {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "quantidade")]
    pub quantity: i64,
    #[serde(rename = "qtd_min")]
    pub min_quantity: i64,
}

impl StockReportRow {
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

impl From<StockItem> for StockReportRow {
    fn from(item: StockItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            category: item.category,
            quantity: item.quantity,
            min_quantity: item.min_quantity,
        }
    }
}

/// Fetch `/peca` and replace the cached snapshot.
///
/// A fetch failure leaves the previous snapshot untouched. A failed write
/// is surfaced through the store's notice sink; the fresh rows are still
/// returned.
pub async fn refresh_stock_report(api: &ApiClient, store: &Store) -> Result<Vec<StockReportRow>, ApiError> {
    let rows: Vec<StockReportRow> = api.stock().await?.into_iter().map(StockReportRow::from).collect();
    let saved = store.save(STOCK_REPORT_KEY, &rows);
    info!(rows = rows.len(), saved, "stock report refreshed");
    Ok(rows)
}

#[must_use]
pub fn cached_stock_report(store: &Store) -> Vec<StockReportRow> {
    store.load_or(STOCK_REPORT_KEY, Vec::new())
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
