//! Per-trade replay engine.
//!
//! This crate drives the trade replay chart:
//! - `alignment` - matching a trade's recorded entry against the feed
//! - `replay` - live/cut mode, stepping and playback state
//! - `viewport` - go-to-trade ranges, backfill triggers, magnet snapping
//! - `drawing` - annotations with undo/redo and debounced saving
//! - `session` - one open trade wired to its charts and stores

pub mod alignment;
pub mod drawing;
pub mod error;
pub mod playback;
pub mod replay;
pub mod session;
pub mod trade;
pub mod viewport;

#[cfg(test)]
pub(crate) mod test_support;

pub use alignment::{local_tz_offset_seconds, AlignmentState};
pub use drawing::{
    AnnotationLayer, DrawingId, DrawingKind, DrawingObject, DrawingPoint, DrawingStyle,
    DrawingTool, History, PendingWrite,
};
pub use error::{ReplayError, Result};
pub use playback::PlaybackTimer;
pub use replay::{ReplayController, ReplayMode};
pub use session::{ReplaySession, SessionContext, SessionEvent};
pub use trade::{ChartSurface, Patch, StoreError, TimeRange, Trade, TradePatch, TradeStore, ViewLayout};
pub use viewport::{snap_point, ViewportId};
