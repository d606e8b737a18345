//! Display feed and inventory deep links.
//!
//! DESIGN
//! ======
//! Both notification sources project into `FeedItem`. The badge shows the
//! item count; the popup lists items ascending by `id`. Selecting an item
//! yields an `InventoryLink` (`/estoque?abrirPeca=<id>`), which the
//! inventory view resolves against its current rows. An id with no matching
//! row is not an error: the view just opens without an edit form.

use std::fmt;

use crate::alerts::ServerAlert;
use crate::ledger::Notification;
use crate::report::StockReportRow;

pub const INVENTORY_PATH: &str = "/estoque";
pub const OPEN_PART_PARAM: &str = "abrirPeca";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: i64,
    pub message: String,
    pub part_name: Option<String>,
}

impl From<ServerAlert> for FeedItem {
    fn from(alert: ServerAlert) -> Self {
        Self { id: alert.id, message: alert.message, part_name: alert.part_name }
    }
}

impl From<Notification> for FeedItem {
    fn from(notification: Notification) -> Self {
        Self { id: notification.id, message: notification.message, part_name: None }
    }
}

/// Snapshot published by the poller after each refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub items: Vec<FeedItem>,
    /// Refreshes completed so far, successful or not.
    pub ticks: u64,
}

impl Feed {
    #[must_use]
    pub fn badge_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in display order (ascending `id`, stable for ties).
    #[must_use]
    pub fn sorted(&self) -> Vec<&FeedItem> {
        let mut items: Vec<&FeedItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.id);
        items
    }
}

// =============================================================================
// DEEP LINKS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryLink {
    pub part_id: i64,
}

impl InventoryLink {
    #[must_use]
    pub fn for_item(item: &FeedItem) -> Self {
        Self { part_id: item.id }
    }

    #[must_use]
    pub fn to_path(&self) -> String {
        format!("{INVENTORY_PATH}?{OPEN_PART_PARAM}={}", self.part_id)
    }

    /// Read a link back from a path. Other paths, a missing parameter, or a
    /// value that is not the canonical decimal form of an id yield `None`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let (route, query) = path.split_once('?')?;
        if route != INVENTORY_PATH {
            return None;
        }
        let raw = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find_map(|(key, value)| (key == OPEN_PART_PARAM).then_some(value))?;
        let part_id = raw.parse::<i64>().ok().filter(|id| id.to_string() == raw)?;
        Some(Self { part_id })
    }

    /// The row this link opens, if it is present.
    #[must_use]
    pub fn resolve<'a>(&self, rows: &'a [StockReportRow]) -> Option<&'a StockReportRow> {
        rows.iter().find(|row| row.id == self.part_id)
    }
}

impl fmt::Display for InventoryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
