//! Remote candle sources.

use async_trait::async_trait;
use candle_api::{CandleClient, CandleQuery};
use replay_core::{validate_bar, CandleBar};
use std::sync::Arc;
use thiserror::Error;

/// Failure fetching candles from a remote source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote fetch failed: {0}")]
    Remote(candle_api::Error),
    #[error("could not decode candles: {0}")]
    Decode(String),
}

impl From<candle_api::Error> for FetchError {
    fn from(err: candle_api::Error) -> Self {
        match err {
            candle_api::Error::Json(e) => FetchError::Decode(e.to_string()),
            other => FetchError::Remote(other),
        }
    }
}

/// A source of historical candles.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch the bars in `[query.from, query.to]`. The result need not be sorted.
    async fn fetch(&self, query: &CandleQuery) -> Result<Vec<CandleBar>, FetchError>;
}

#[async_trait]
impl<T: CandleSource + ?Sized> CandleSource for Arc<T> {
    async fn fetch(&self, query: &CandleQuery) -> Result<Vec<CandleBar>, FetchError> {
        (**self).fetch(query).await
    }
}

/// [`CandleSource`] backed by the journal backend's HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpCandleSource {
    client: CandleClient,
}

impl HttpCandleSource {
    pub fn new(client: CandleClient) -> Self {
        Self { client }
    }

    /// Build a source from the `[api]` section of the config.
    pub fn from_config(api: &replay_config::ApiConfig) -> Result<Self, FetchError> {
        let config = candle_api::Config::new(&api.base_url)
            .with_timeout(api.timeout())
            .with_user_agent(&api.user_agent);
        Ok(Self::new(CandleClient::new(config)?))
    }
}

#[async_trait]
impl CandleSource for HttpCandleSource {
    async fn fetch(&self, query: &CandleQuery) -> Result<Vec<CandleBar>, FetchError> {
        let bars = self.client.fetch_candles(query).await?;
        let total = bars.len();
        let valid: Vec<CandleBar> = bars.into_iter().filter(validate_bar).collect();
        if valid.len() < total {
            log::warn!(
                "{}: dropped {} malformed bars from [{}, {}]",
                query.instrument,
                total - valid.len(),
                query.from,
                query.to
            );
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_decode() {
        let json_err = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        let err = FetchError::from(candle_api::Error::Json(json_err));
        assert!(matches!(err, FetchError::Decode(_)));

        let err = FetchError::from(candle_api::Error::Timeout);
        assert!(matches!(err, FetchError::Remote(candle_api::Error::Timeout)));
    }
}
