//! Core types for the trade replay engine.
//!
//! This crate provides the data structures shared by the sync and replay crates:
//! - `CandleBar` - one OHLC sample with optional volume
//! - `Timeframe` - chart period enumeration and aggregation
//! - `CandleStore` - in-memory series keyed by instrument and timeframe

pub mod candle;
pub mod series;
pub mod timeframe;

pub use candle::{validate_bar, CandleBar, Ohlc};
pub use series::{merge, CandleStore, Coverage, SeriesKey};
pub use timeframe::{aggregate, aggregate_candles, ParseTimeframeError, Timeframe};
