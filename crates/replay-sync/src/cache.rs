//! Storage the sync coordinator writes into.

use anyhow::Result;
use replay_core::{CandleBar, CandleStore, SeriesKey};

use crate::db::CandleDb;

/// A local candle cache. Coverage is derived from its extremes only.
pub trait CandleCache {
    fn newest_time(&self, key: &SeriesKey) -> Result<Option<i64>>;

    fn oldest_time(&self, key: &SeriesKey) -> Result<Option<i64>>;

    /// Upsert bars by time and return how many were stored.
    fn insert(&mut self, key: &SeriesKey, bars: &[CandleBar]) -> Result<usize>;

    /// Bars with `from <= time <= to`, ascending.
    fn load_range(&self, key: &SeriesKey, from: i64, to: i64) -> Result<Vec<CandleBar>>;
}

impl CandleCache for CandleStore {
    fn newest_time(&self, key: &SeriesKey) -> Result<Option<i64>> {
        Ok(CandleStore::newest_time(self, key))
    }

    fn oldest_time(&self, key: &SeriesKey) -> Result<Option<i64>> {
        Ok(CandleStore::oldest_time(self, key))
    }

    /// Counts newly added timestamps only.
    fn insert(&mut self, key: &SeriesKey, bars: &[CandleBar]) -> Result<usize> {
        Ok(self.merge_into(key, bars))
    }

    fn load_range(&self, key: &SeriesKey, from: i64, to: i64) -> Result<Vec<CandleBar>> {
        Ok(self.range(key, from, to).to_vec())
    }
}

impl CandleCache for CandleDb {
    fn newest_time(&self, key: &SeriesKey) -> Result<Option<i64>> {
        self.get_newest_time(key)
    }

    fn oldest_time(&self, key: &SeriesKey) -> Result<Option<i64>> {
        self.get_oldest_time(key)
    }

    fn insert(&mut self, key: &SeriesKey, bars: &[CandleBar]) -> Result<usize> {
        self.insert_candles(key, bars)
    }

    fn load_range(&self, key: &SeriesKey, from: i64, to: i64) -> Result<Vec<CandleBar>> {
        self.load_candles_range(key, from, to)
    }
}
