//! Historical candle synchronization for trade replay.
//!
//! This crate keeps a local candle cache in step with the journal backend.
//! Incremental sync bridges the gap between the newest cached bar and now in
//! one request; bulk import walks a window backward in small chunks, retrying
//! and skipping chunks the backend cannot serve.

pub mod cache;
pub mod db;
pub mod source;

use anyhow::{Context, Result};
use candle_api::CandleQuery;
use replay_config::SyncConfig;
use replay_core::{SeriesKey, Timeframe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use cache::CandleCache;
pub use db::CandleDb;
pub use source::{CandleSource, FetchError, HttpCandleSource};

/// Result of an incremental sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cache already reaches now; nothing was requested.
    UpToDate,
    /// One window was fetched and merged.
    Synced {
        /// Bars returned by the source.
        fetched: usize,
        /// Bars the cache reported as stored.
        stored: usize,
    },
}

/// Progress update sent during a bulk import.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncProgress {
    /// Share of the window processed, 0..=100.
    pub percent: u8,
    /// Chunks processed so far, fetched or skipped.
    pub chunks: usize,
    /// Bars stored so far.
    pub stored: u64,
}

/// Summary of a bulk import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub chunks: usize,
    pub fetched_chunks: usize,
    /// Windows that failed every attempt, as `(from, to)`.
    pub skipped: Vec<(i64, i64)>,
    pub stored: u64,
    pub cancelled: bool,
}

/// Tunables for the coordinator, taken from the `[sync]` config section.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub default_lookback_secs: i64,
    pub chunk_secs: i64,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub chunk_pause: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            default_lookback_secs: i64::from(config.default_lookback_days) * 86_400,
            chunk_secs: config.chunk_secs(),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            chunk_pause: config.chunk_pause(),
        }
    }
}

/// Coordinates fetches from a [`CandleSource`] into a [`CandleCache`].
pub struct SyncCoordinator<S> {
    source: S,
    settings: SyncSettings,
    cancel_flag: Arc<AtomicBool>,
}

impl<S: CandleSource> SyncCoordinator<S> {
    /// Create a new coordinator.
    pub fn new(source: S, settings: SyncSettings) -> Self {
        Self {
            source,
            settings,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Check if the running import should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Request cancellation of the current import.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Reset the cancel flag for a new import.
    pub fn reset_cancel(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
    }

    /// Handle for cancelling from another task.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    /// Bridge the gap between the newest cached minute bar and now.
    pub async fn sync_incremental<C: CandleCache>(
        &self,
        cache: &mut C,
        instrument: &str,
    ) -> Result<SyncOutcome> {
        self.sync_incremental_at(cache, instrument, now_secs()).await
    }

    /// [`Self::sync_incremental`] against an explicit clock.
    pub async fn sync_incremental_at<C: CandleCache>(
        &self,
        cache: &mut C,
        instrument: &str,
        now: i64,
    ) -> Result<SyncOutcome> {
        let key = SeriesKey::base(instrument);
        let newest = cache
            .newest_time(&key)
            .with_context(|| format!("Failed to read newest cached bar for {instrument}"))?;

        let start = match newest {
            Some(time) => time + 60,
            None => now - self.settings.default_lookback_secs,
        };

        if start >= now {
            log::debug!("{} is up to date (newest {:?})", instrument, newest);
            return Ok(SyncOutcome::UpToDate);
        }

        log::info!("Syncing {} from {} to {}", instrument, start, now);
        let query = CandleQuery::new(instrument, start, now, Timeframe::Min1);
        let bars = self
            .source
            .fetch(&query)
            .await
            .with_context(|| format!("Incremental sync of {instrument} failed"))?;

        let stored = cache.insert(&key, &bars)?;
        log::info!("{}: fetched {} bars, stored {}", instrument, bars.len(), stored);

        Ok(SyncOutcome::Synced {
            fetched: bars.len(),
            stored,
        })
    }

    /// Import `[from, to]` for an instrument, walking backward in chunks.
    ///
    /// Each chunk gets `max_retries` attempts with a fixed delay between them.
    /// A chunk that fails every attempt, or that the cache refuses to store,
    /// is logged and skipped; it is not retried later. Progress is reported after every chunk and ends at 100
    /// unless the import was cancelled.
    pub async fn import_history<C: CandleCache>(
        &self,
        cache: &mut C,
        instrument: &str,
        from: i64,
        to: i64,
        progress_tx: Option<&mpsc::Sender<SyncProgress>>,
    ) -> Result<ImportReport> {
        let key = SeriesKey::base(instrument);
        let mut report = ImportReport::default();

        if from >= to {
            log::warn!("Empty import window for {}: [{}, {}]", instrument, from, to);
            send_progress(progress_tx, 100, &report).await;
            return Ok(report);
        }

        let total = (to - from) as f64;
        let chunk = self.settings.chunk_secs.max(60);
        eprintln!(
            "[sync] importing {} from {} to {} in {}s chunks",
            instrument, from, to, chunk
        );

        let mut current_to = to;
        while current_to > from {
            if self.is_cancelled() {
                log::info!("Import of {} cancelled", instrument);
                report.cancelled = true;
                break;
            }

            let chunk_from = (current_to - chunk).max(from);
            let query = CandleQuery::new(instrument, chunk_from, current_to, Timeframe::Min1).force();

            match self.fetch_with_retry(&query).await {
                Some(bars) => match cache.insert(&key, &bars) {
                    Ok(stored) => {
                        report.fetched_chunks += 1;
                        report.stored += stored as u64;
                    }
                    Err(e) => {
                        log::error!(
                            "Skipping chunk [{}, {}] of {}: failed to store: {:#}",
                            chunk_from,
                            current_to,
                            instrument,
                            e
                        );
                        report.skipped.push((chunk_from, current_to));
                    }
                },
                None => {
                    log::error!(
                        "Skipping chunk [{}, {}] of {} after {} attempts",
                        chunk_from,
                        current_to,
                        instrument,
                        self.settings.max_retries
                    );
                    report.skipped.push((chunk_from, current_to));
                }
            }
            report.chunks += 1;

            let processed = (to - chunk_from) as f64;
            let percent = ((processed / total) * 100.0).min(100.0) as u8;
            send_progress(progress_tx, percent, &report).await;

            current_to = chunk_from - 1;
            if current_to > from && !self.settings.chunk_pause.is_zero() {
                tokio::time::sleep(self.settings.chunk_pause).await;
            }
        }

        if !report.cancelled {
            send_progress(progress_tx, 100, &report).await;
        }

        eprintln!(
            "[sync] {} import complete: {} chunks, {} skipped, {} bars stored",
            instrument,
            report.chunks,
            report.skipped.len(),
            report.stored
        );

        Ok(report)
    }

    /// Fetch one chunk, retrying with a fixed delay. `None` once every attempt failed.
    async fn fetch_with_retry(&self, query: &CandleQuery) -> Option<Vec<replay_core::CandleBar>> {
        let attempts = self.settings.max_retries.max(1);
        for attempt in 1..=attempts {
            match self.source.fetch(query).await {
                Ok(bars) => return Some(bars),
                Err(e) => {
                    log::warn!(
                        "Chunk [{}, {}] attempt {}/{} failed: {}",
                        query.from,
                        query.to,
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }
        None
    }
}

async fn send_progress(
    progress_tx: Option<&mpsc::Sender<SyncProgress>>,
    percent: u8,
    report: &ImportReport,
) {
    if let Some(tx) = progress_tx {
        let _ = tx
            .send(SyncProgress {
                percent,
                chunks: report.chunks,
                stored: report.stored,
            })
            .await;
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
