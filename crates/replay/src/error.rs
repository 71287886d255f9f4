use replay_sync::FetchError;
use thiserror::Error;

use crate::trade::StoreError;

/// Errors surfaced by a replay session.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The remote candle source failed; the chart shows "no data".
    #[error("failed to fetch candles: {0}")]
    Fetch(String),
    #[error("no candle data for {0}")]
    NoData(String),
    /// Saving to the trade store failed. Logged, never retried.
    #[error("failed to persist trade: {0}")]
    Persistence(String),
}

impl From<FetchError> for ReplayError {
    fn from(err: FetchError) -> Self {
        ReplayError::Fetch(err.to_string())
    }
}

impl From<StoreError> for ReplayError {
    fn from(err: StoreError) -> Self {
        ReplayError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReplayError>;
