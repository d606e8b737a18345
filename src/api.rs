//! Inventory API client.
//!
//! Thin HTTP wrapper for the two read endpoints this crate consumes. Any
//! non-2xx status is an error; callers decide whether that is fatal.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::alerts::{ServerAlert, StockItem};
use crate::config::{HttpTimeouts, normalize_base_url};

pub const STOCK_ALERTS_PATH: &str = "/notificacoes-estoque";
pub const STOCK_PATH: &str = "/peca";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("response from {url} could not be parsed: {message}")]
    Parse { url: String, message: String },
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: normalize_base_url(base_url) })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/notificacoes-estoque`
    pub async fn stock_alerts(&self) -> Result<Vec<ServerAlert>, ApiError> {
        self.get_json(STOCK_ALERTS_PATH).await
    }

    /// `GET {base}/peca`
    pub async fn stock(&self) -> Result<Vec<StockItem>, ApiError> {
        self.get_json(STOCK_PATH).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Request { url: url.clone(), message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { url, status: status.as_u16() });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request { url: url.clone(), message: e.to_string() })?;

        serde_json::from_str(&text).map_err(|e| ApiError::Parse { url, message: e.to_string() })
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
