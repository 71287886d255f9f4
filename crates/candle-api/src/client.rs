//! HTTP client for the candle endpoint.

use reqwest::{Client, Response};
use std::sync::Arc;
use url::Url;

use replay_core::CandleBar;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{CandleQuery, ErrorBody, WireCandle};

/// Response header the backend sets when its own cache write failed.
pub const DB_ERROR_HEADER: &str = "X-DB-Error";

/// HTTP client for fetching candles from the journal backend.
#[derive(Debug, Clone)]
pub struct CandleClient {
    config: Arc<Config>,
    http: Client,
}

impl CandleClient {
    /// Create a new client with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Create a client for `base_url` with default settings.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(Config::new(base_url))
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the full request URL for a query.
    pub fn endpoint_url(&self, query: &CandleQuery) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)?.join(&self.config.candles_path)?;
        url.query_pairs_mut().extend_pairs(query.query_pairs()?);
        Ok(url)
    }

    /// Fetch the candles matching `query`, sorted as the backend returns them.
    pub async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<CandleBar>> {
        let url = self.endpoint_url(query)?;
        tracing::debug!(
            "GET {} {} [{} .. {}]",
            self.config.candles_path,
            query.instrument,
            query.from,
            query.to
        );

        let response = self.http.get(url).send().await?;
        let wire: Vec<WireCandle> = self.handle_response(response).await?;
        Ok(wire.into_iter().map(CandleBar::from).collect())
    }

    /// Handle the API response.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T> {
        let status = response.status();

        // A storage failure is reported even on a success status
        if let Some(db_error) = response.headers().get(DB_ERROR_HEADER) {
            let message = db_error.to_str().unwrap_or("unreadable header").to_string();
            tracing::warn!("Backend storage error: {}", message);
            return Err(Error::Storage(message));
        }

        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.details)
                .unwrap_or(body);
            tracing::warn!("Candle request failed with {}: {}", status, detail);
            return Err(Error::Api {
                status: status.as_u16(),
                body: detail,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse response: {}", body);
            Error::Json(e)
        })
    }
}
