//! # Candle API Client Library
//!
//! Client for the journal backend's `/api/candles` endpoint, which serves
//! minute-resolution OHLC history for arbitrary instruments.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use candle_api::{CandleClient, CandleQuery};
//! use replay_core::Timeframe;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), candle_api::Error> {
//!     let client = CandleClient::with_base_url("http://localhost:3000")?;
//!     let query = CandleQuery::new("EURUSD", 1_704_067_200, 1_704_070_800, Timeframe::Min1);
//!     let bars = client.fetch_candles(&query).await?;
//!     println!("{} bars", bars.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use candle_api::{CandleClient, Config};
//! use std::time::Duration;
//!
//! let config = Config::new("https://journal.example.com")
//!     .with_timeout(Duration::from_secs(10));
//!
//! let client = CandleClient::new(config)?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use client::CandleClient;
pub use config::Config;
pub use error::{Error, Result};
pub use types::{iso_timestamp, CandleQuery, WireCandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default backend URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Path of the candle endpoint
pub const CANDLES_PATH: &str = "/api/candles";
