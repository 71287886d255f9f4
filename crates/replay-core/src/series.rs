//! Candle series keyed by instrument and timeframe.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::candle::CandleBar;
use crate::timeframe::Timeframe;

/// Identifies one cached series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub instrument: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
        }
    }

    /// Key of the one-minute base series for `instrument`.
    pub fn base(instrument: impl Into<String>) -> Self {
        Self::new(instrument, Timeframe::Min1)
    }
}

/// Merge `incoming` bars into `existing`.
///
/// Bars are keyed by `time`; an incoming bar replaces an existing bar with the
/// same time. The result is sorted ascending. `incoming` need not be sorted.
pub fn merge(existing: &[CandleBar], incoming: &[CandleBar]) -> Vec<CandleBar> {
    let mut by_time: BTreeMap<i64, CandleBar> = BTreeMap::new();
    for bar in existing.iter().chain(incoming) {
        by_time.insert(bar.time, *bar);
    }
    by_time.into_values().collect()
}

/// Extent of one cached series.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub key: SeriesKey,
    pub from: i64,
    pub to: i64,
    pub count: usize,
}

/// In-memory cache of candle series for a session.
#[derive(Debug, Default, Clone)]
pub struct CandleStore {
    series: HashMap<SeriesKey, Vec<CandleBar>>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bars for `key`, or an empty slice.
    pub fn get(&self, key: &SeriesKey) -> &[CandleBar] {
        self.series.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merge bars into the series and return how many new timestamps were added.
    pub fn merge_into(&mut self, key: &SeriesKey, incoming: &[CandleBar]) -> usize {
        if incoming.is_empty() {
            return 0;
        }
        let entry = self.series.entry(key.clone()).or_default();
        let before = entry.len();
        *entry = merge(entry, incoming);
        entry.len() - before
    }

    /// Time of the newest bar in the series.
    pub fn newest_time(&self, key: &SeriesKey) -> Option<i64> {
        self.get(key).last().map(|b| b.time)
    }

    /// Time of the oldest bar in the series.
    pub fn oldest_time(&self, key: &SeriesKey) -> Option<i64> {
        self.get(key).first().map(|b| b.time)
    }

    /// Bars with `from <= time <= to`.
    pub fn range(&self, key: &SeriesKey, from: i64, to: i64) -> &[CandleBar] {
        let bars = self.get(key);
        let start = bars.partition_point(|b| b.time < from);
        let end = bars.partition_point(|b| b.time <= to);
        if start >= end {
            return &[];
        }
        &bars[start..end]
    }

    pub fn remove(&mut self, key: &SeriesKey) -> Option<Vec<CandleBar>> {
        self.series.remove(key)
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Number of series held.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Extent of every non-empty series, ordered by key.
    pub fn coverage(&self) -> Vec<Coverage> {
        let mut out: Vec<Coverage> = self
            .series
            .iter()
            .filter_map(|(key, bars)| {
                let first = bars.first()?;
                let last = bars.last()?;
                Some(Coverage {
                    key: key.clone(),
                    from: first.time,
                    to: last.time,
                    count: bars.len(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }
}
