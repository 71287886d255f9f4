//! Bulk candle import tool
//!
//! Fills the local DuckDB cache with minute history for one instrument.
//!
//! Usage: replay-import <instrument> [--days N] [--from DATE] [--to DATE]
//!        [--incremental] [--gaps] [--config PATH] [--db PATH] [--base-url URL]

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use replay_config::Config;
use replay_core::SeriesKey;
use replay_sync::{
    now_secs, CandleDb, HttpCandleSource, SyncCoordinator, SyncOutcome, SyncProgress, SyncSettings,
};
use tokio::sync::mpsc;

/// Default import window when neither --days nor --from is given.
const DEFAULT_DAYS: i64 = 30;

fn print_usage(program: &str) {
    eprintln!("Usage: {} <instrument> [options]", program);
    eprintln!("Options:");
    eprintln!(
        "  --days N         Import the last N days (default: {})",
        DEFAULT_DAYS
    );
    eprintln!("  --from DATE      Window start, YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS (UTC)");
    eprintln!("  --to DATE        Window end (default: now)");
    eprintln!("  --incremental    Only bridge from the newest cached bar to now");
    eprintln!("  --gaps           List holes in the cached series afterwards");
    eprintln!("  --config PATH    Config file (default: replay.toml search path)");
    eprintln!("  --db PATH        DuckDB file (overrides config)");
    eprintln!("  --base-url URL   Backend URL (overrides config)");
    eprintln!();
    eprintln!("Example: {} EURUSD --days 14 --gaps", program);
}

/// Parse a UTC date or datetime into unix seconds.
fn parse_time(value: &str) -> Result<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {value}"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid date: {value}"))?;
    Ok(midnight.and_utc().timestamp())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1].starts_with("--") {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let instrument = args[1].clone();
    let mut days = DEFAULT_DAYS;
    let mut from_arg: Option<String> = None;
    let mut to_arg: Option<String> = None;
    let mut incremental = false;
    let mut show_gaps = false;
    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut base_url: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--days" if i + 1 < args.len() => {
                days = args[i + 1].parse().unwrap_or(DEFAULT_DAYS);
                i += 2;
            }
            "--from" if i + 1 < args.len() => {
                from_arg = Some(args[i + 1].clone());
                i += 2;
            }
            "--to" if i + 1 < args.len() => {
                to_arg = Some(args[i + 1].clone());
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--db" if i + 1 < args.len() => {
                db_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--base-url" if i + 1 < args.len() => {
                base_url = Some(args[i + 1].clone());
                i += 2;
            }
            "--incremental" => {
                incremental = true;
                i += 1;
            }
            "--gaps" => {
                show_gaps = true;
                i += 1;
            }
            other => {
                log::warn!("Ignoring unknown argument {:?}", other);
                i += 1;
            }
        }
    }

    let mut config = match config_path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(url) = base_url {
        config.api.base_url = url;
    }
    if let Some(path) = db_path {
        config.sync.db_path = Some(path);
    }

    let db_file = config.sync.get_db_path();
    let mut db = CandleDb::open(&db_file)?;
    let source = HttpCandleSource::from_config(&config.api)?;
    let coordinator = SyncCoordinator::new(source, SyncSettings::from(&config.sync));

    log::info!(
        "Using backend {} and cache {}",
        config.api.base_url,
        db_file.display()
    );

    if incremental {
        match coordinator.sync_incremental(&mut db, &instrument).await? {
            SyncOutcome::UpToDate => eprintln!("[sync] {} already up to date", instrument),
            SyncOutcome::Synced { fetched, stored } => {
                eprintln!("[sync] {}: fetched {} bars, stored {}", instrument, fetched, stored)
            }
        }
    } else {
        let to = match &to_arg {
            Some(value) => parse_time(value)?,
            None => now_secs(),
        };
        let from = match &from_arg {
            Some(value) => parse_time(value)?,
            None => to - days * 86_400,
        };
        if from >= to {
            bail!("--from must be before --to");
        }

        let (progress_tx, mut progress_rx) = mpsc::channel::<SyncProgress>(100);
        let printer = tokio::spawn(async move {
            let mut last = None;
            while let Some(progress) = progress_rx.recv().await {
                if last != Some(progress.percent) {
                    eprintln!(
                        "[sync] {:>3}% ({} chunks, {} bars)",
                        progress.percent, progress.chunks, progress.stored
                    );
                    last = Some(progress.percent);
                }
            }
        });

        let report = coordinator
            .import_history(&mut db, &instrument, from, to, Some(&progress_tx))
            .await?;
        drop(progress_tx);
        let _ = printer.await;

        for (skip_from, skip_to) in &report.skipped {
            eprintln!("[sync] skipped window {} .. {}", skip_from, skip_to);
        }
    }

    let key = SeriesKey::base(instrument.as_str());
    if show_gaps {
        let gaps = db.find_gaps(&key)?;
        eprintln!("[sync] {} gaps in cached series", gaps.len());
        for (gap_from, gap_to) in gaps {
            eprintln!("  {} .. {}", gap_from, gap_to);
        }
    }

    for coverage in db.coverage()? {
        if coverage.key == key {
            println!(
                "{} {}: {} bars from {} to {}",
                coverage.key.instrument,
                coverage.key.timeframe,
                coverage.count,
                coverage.from,
                coverage.to
            );
        }
    }

    Ok(())
}
