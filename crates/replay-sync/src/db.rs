//! DuckDB storage for candle data.

use anyhow::{Context, Result};
use duckdb::{params, Connection, Row};
use replay_core::{CandleBar, Coverage, SeriesKey, Timeframe};
use std::path::Path;

/// DuckDB wrapper for candle storage.
pub struct CandleDb {
    conn: Connection,
}

impl CandleDb {
    /// Create or open a DuckDB database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                time BIGINT NOT NULL,
                open DOUBLE NOT NULL,
                high DOUBLE NOT NULL,
                low DOUBLE NOT NULL,
                close DOUBLE NOT NULL,
                volume DOUBLE,
                PRIMARY KEY (instrument, timeframe, time)
            );

            CREATE INDEX IF NOT EXISTS idx_candles_instrument_tf_time
                ON candles(instrument, timeframe, time DESC);
            "#,
        )?;
        Ok(())
    }

    /// Insert candles for a series (upserts on conflict).
    pub fn insert_candles(&self, key: &SeriesKey, bars: &[CandleBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut stmt = self.conn.prepare(
            r#"
            INSERT OR REPLACE INTO candles (instrument, timeframe, time, open, high, low, close, volume)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )?;

        let mut count = 0;
        for bar in bars {
            stmt.execute(params![
                key.instrument,
                key.timeframe.label(),
                bar.time,
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume,
            ])?;
            count += 1;
        }

        Ok(count)
    }

    /// Get the oldest bar time (unix seconds) of a series.
    pub fn get_oldest_time(&self, key: &SeriesKey) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT MIN(time) FROM candles WHERE instrument = ? AND timeframe = ?")?;
        let result: Option<i64> = stmt
            .query_row(params![key.instrument, key.timeframe.label()], |row| row.get(0))?;
        Ok(result)
    }

    /// Get the newest bar time (unix seconds) of a series.
    pub fn get_newest_time(&self, key: &SeriesKey) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT MAX(time) FROM candles WHERE instrument = ? AND timeframe = ?")?;
        let result: Option<i64> = stmt
            .query_row(params![key.instrument, key.timeframe.label()], |row| row.get(0))?;
        Ok(result)
    }

    /// Get the candle count for an instrument across all timeframes.
    pub fn get_candle_count(&self, instrument: &str) -> Result<u64> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM candles WHERE instrument = ?")?;
        let count: i64 = stmt.query_row([instrument], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Load every bar of a series.
    pub fn load_candles(&self, key: &SeriesKey) -> Result<Vec<CandleBar>> {
        self.load_candles_range(key, i64::MIN, i64::MAX)
    }

    /// Load bars with `from <= time <= to` for a series.
    pub fn load_candles_range(&self, key: &SeriesKey, from: i64, to: i64) -> Result<Vec<CandleBar>> {
        let mut stmt = self.conn.prepare(
            "SELECT time, open, high, low, close, volume FROM candles
             WHERE instrument = ? AND timeframe = ? AND time >= ? AND time <= ?
             ORDER BY time ASC",
        )?;

        let bars: Vec<CandleBar> = stmt
            .query_map(
                params![key.instrument, key.timeframe.label(), from, to],
                bar_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bars)
    }

    /// Find holes in a series, as inclusive `(from, to)` windows of missing bars.
    ///
    /// Minute data has no bars outside trading hours, so callers decide which
    /// gaps are worth refetching.
    pub fn find_gaps(&self, key: &SeriesKey) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT time FROM candles WHERE instrument = ? AND timeframe = ? ORDER BY time ASC",
        )?;

        let times: Vec<i64> = stmt
            .query_map(params![key.instrument, key.timeframe.label()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let step = key.timeframe.seconds();
        let gaps = times
            .windows(2)
            .filter(|w| w[1] - w[0] > step)
            .map(|w| (w[0] + step, w[1] - step))
            .collect();

        Ok(gaps)
    }

    /// Extent of every cached series.
    pub fn coverage(&self) -> Result<Vec<Coverage>> {
        let mut stmt = self.conn.prepare(
            "SELECT instrument, timeframe, MIN(time), MAX(time), COUNT(*) FROM candles
             GROUP BY instrument, timeframe
             ORDER BY instrument, timeframe",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut coverage = Vec::with_capacity(rows.len());
        for (instrument, label, from, to, count) in rows {
            let Ok(timeframe) = label.parse::<Timeframe>() else {
                log::warn!("Skipping series {} with unknown timeframe {:?}", instrument, label);
                continue;
            };
            coverage.push(Coverage {
                key: SeriesKey::new(instrument, timeframe),
                from,
                to,
                count: count.max(0) as usize,
            });
        }
        Ok(coverage)
    }

    /// Delete every cached bar of an instrument. Returns the number of rows removed.
    pub fn clear_instrument(&self, instrument: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM candles WHERE instrument = ?", [instrument])?;
        Ok(deleted)
    }
}

fn bar_from_row(row: &Row<'_>) -> duckdb::Result<CandleBar> {
    Ok(CandleBar {
        time: row.get(0)?,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
        volume: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute_bars(start: i64, count: i64) -> Vec<CandleBar> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                CandleBar::new(start + i * 60, base, base + 5.0, base - 1.0, base + 4.0)
            })
            .collect()
    }

    #[test]
    fn test_db_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = CandleDb::open(dir.path().join("test.duckdb")).unwrap();
        let key = SeriesKey::base("EURUSD");

        let mut bars = minute_bars(1_700_000_040, 3);
        bars[1] = bars[1].with_volume(1500.0);

        let inserted = db.insert_candles(&key, &bars).unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(db.get_candle_count("EURUSD").unwrap(), 3);

        let loaded = db.load_candles(&key).unwrap();
        assert_eq!(loaded, bars);
        assert_eq!(loaded[0].volume, None);
        assert_eq!(loaded[1].volume, Some(1500.0));
    }

    #[test]
    fn test_upsert_replaces_same_time() {
        let dir = tempfile::tempdir().unwrap();
        let db = CandleDb::open(dir.path().join("test.duckdb")).unwrap();
        let key = SeriesKey::base("EURUSD");

        db.insert_candles(&key, &minute_bars(0, 2)).unwrap();
        let replacement = CandleBar::new(60, 1.0, 2.0, 0.5, 1.5);
        db.insert_candles(&key, &[replacement]).unwrap();

        let loaded = db.load_candles(&key).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1], replacement);
    }

    #[test]
    fn test_extremes_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let db = CandleDb::open(dir.path().join("test.duckdb")).unwrap();
        let key = SeriesKey::base("NAS100");

        assert_eq!(db.get_newest_time(&key).unwrap(), None);
        assert_eq!(db.get_oldest_time(&key).unwrap(), None);

        db.insert_candles(&key, &minute_bars(600, 10)).unwrap();
        assert_eq!(db.get_oldest_time(&key).unwrap(), Some(600));
        assert_eq!(db.get_newest_time(&key).unwrap(), Some(600 + 9 * 60));

        let range = db.load_candles_range(&key, 720, 900).unwrap();
        let times: Vec<i64> = range.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![720, 780, 840, 900]);

        // Other timeframes of the same instrument are separate series
        let hourly = SeriesKey::new("NAS100", Timeframe::Hour1);
        assert_eq!(db.get_newest_time(&hourly).unwrap(), None);
    }

    #[test]
    fn test_find_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let db = CandleDb::open(dir.path().join("test.duckdb")).unwrap();
        let key = SeriesKey::base("XAUUSD");

        db.insert_candles(&key, &minute_bars(0, 3)).unwrap();
        db.insert_candles(&key, &minute_bars(600, 2)).unwrap();

        let gaps = db.find_gaps(&key).unwrap();
        assert_eq!(gaps, vec![(180, 540)]);
    }

    #[test]
    fn test_coverage_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let db = CandleDb::open(dir.path().join("test.duckdb")).unwrap();

        db.insert_candles(&SeriesKey::base("B"), &minute_bars(0, 4)).unwrap();
        db.insert_candles(&SeriesKey::base("A"), &minute_bars(120, 2)).unwrap();

        let coverage = db.coverage().unwrap();
        assert_eq!(coverage.len(), 2);
        assert_eq!(coverage[0].key, SeriesKey::base("A"));
        assert_eq!((coverage[0].from, coverage[0].to, coverage[0].count), (120, 180, 2));
        assert_eq!(coverage[1].count, 4);

        assert_eq!(db.clear_instrument("B").unwrap(), 4);
        assert_eq!(db.get_candle_count("B").unwrap(), 0);
        assert_eq!(db.coverage().unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("candles.duckdb");
        let key = SeriesKey::base("EURUSD");

        {
            let db = CandleDb::open(&path).unwrap();
            db.insert_candles(&key, &minute_bars(0, 5)).unwrap();
        }

        let db = CandleDb::open(&path).unwrap();
        assert_eq!(db.get_newest_time(&key).unwrap(), Some(240));
    }
}
