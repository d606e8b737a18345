//! Low-stock notification layer for the maintenance dashboard.
//!
//! ARCHITECTURE
//! ============
//! - `store`: persistent key-value store with typed JSON access.
//! - `ledger`: deduplicating notification list kept in the store.
//! - `poller`: periodic refresh of the display feed from the API or the ledger.
//! - `feed`: display items and inventory deep links.
//! - `api`, `alerts`, `report`: inventory API client, alert derivation and
//!   the cached stock report.
//! - `routes`: the alert endpoints served from an inventory file.

pub mod alerts;
pub mod api;
pub mod config;
pub mod feed;
pub mod ledger;
pub mod poller;
pub mod report;
pub mod routes;
pub mod store;

#[cfg(test)]
mod test_support;
