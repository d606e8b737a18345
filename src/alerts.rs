//! Inventory rows and the low-stock alerts derived from them.

use serde::{Deserialize, Serialize};

/// One inventory row as served by `GET /peca`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: i64,
    #[serde(rename = "peca")]
    pub name: String,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "qtd")]
    pub quantity: i64,
    #[serde(rename = "qtd_min")]
    pub min_quantity: i64,
}

impl StockItem {
    /// At or below the minimum counts as low.
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// A low-stock alert as delivered by `GET /notificacoes-estoque`.
///
/// Older backends send only `id` and `mensagem`, so the descriptive fields
/// are optional on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAlert {
    pub id: i64,
    #[serde(rename = "nome_peca", default, skip_serializing_if = "Option::is_none")]
    pub part_name: Option<String>,
    #[serde(rename = "mensagem")]
    pub message: String,
    #[serde(rename = "quantidade_restante", default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(rename = "qtd_min", default, skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<i64>,
}

#[must_use]
pub fn low_stock_message(name: &str, remaining: i64) -> String {
    format!("Peça '{name}' abaixo do mínimo ({remaining} un. restantes)")
}

impl From<&StockItem> for ServerAlert {
    fn from(item: &StockItem) -> Self {
        Self {
            id: item.id,
            part_name: Some(item.name.clone()),
            message: low_stock_message(&item.name, item.quantity),
            remaining: Some(item.quantity),
            min_quantity: Some(item.min_quantity),
        }
    }
}

/// Alerts for every item at or below its minimum, in input order.
#[must_use]
pub fn low_stock_alerts(items: &[StockItem]) -> Vec<ServerAlert> {
    items.iter().filter(|item| item.is_low()).map(ServerAlert::from).collect()
}

#[cfg(test)]
#[path = "alerts_test.rs"]
mod tests;
