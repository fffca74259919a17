//! Batch driver: walks the symbol work list through the retry loop on a
//! small worker pool, skipping anything already on disk, and writes the
//! end-of-run manifest.

use std::path::PathBuf;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::constants::{
    DEFAULT_ITEM_PAUSE_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MIN_REQUEST_INTERVAL_SECS,
    ITEM_PAUSE_JITTER_SECS,
};
use crate::error::Result;
use crate::models::SymbolReport;
use crate::services::history::{fetch_with_retry, FetchOutcome, QuoteSource};
use crate::services::rate_gate::RateGate;
use crate::services::store;

/// Settings for one batch download run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub start: String,
    pub end: String,
    pub out_dir: PathBuf,
    pub workers: usize,
    pub pause_secs: f64,
    pub max_retries: u32,
    pub min_interval_secs: f64,
}

impl BatchConfig {
    pub fn new(start: String, end: String, out_dir: PathBuf) -> Self {
        Self {
            start,
            end,
            out_dir,
            // One worker by default: the gate is process-wide and the
            // provider throttles shared state, so concurrency buys little.
            workers: 1,
            pause_secs: DEFAULT_ITEM_PAUSE_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            min_interval_secs: DEFAULT_MIN_REQUEST_INTERVAL_SECS,
        }
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub requested: usize,
    pub skipped_existing: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_rows: usize,
    /// Per-symbol reports in completion order.
    pub reports: Vec<SymbolReport>,
}

/// Download every pending symbol and write the manifest.
///
/// Symbols whose output file already exists are skipped, so re-running after
/// a partial batch only processes the missing ones.
pub async fn download_all<S: QuoteSource>(
    source: &S,
    symbols: &[String],
    config: &BatchConfig,
) -> Result<BatchSummary> {
    std::fs::create_dir_all(&config.out_dir)?;

    let existing = store::downloaded_symbols(&config.out_dir)?;
    let pending: Vec<String> = symbols
        .iter()
        .filter(|symbol| !existing.contains(*symbol))
        .cloned()
        .collect();
    let skipped_existing = symbols.len() - pending.len();

    info!(
        total = symbols.len(),
        pending = pending.len(),
        skipped = skipped_existing,
        "starting batch download"
    );

    let mut summary = BatchSummary {
        requested: symbols.len(),
        skipped_existing,
        ..Default::default()
    };

    if pending.is_empty() {
        info!("all symbols already downloaded");
        return Ok(summary);
    }

    let gate = RateGate::from_secs(config.min_interval_secs);
    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let reports: Vec<SymbolReport> = stream::iter(pending)
        .map(|symbol| {
            let gate = &gate;
            let pb = &pb;
            async move {
                let report = download_one(source, gate, &symbol, config).await;
                pb.set_message(symbol);
                pb.inc(1);

                // Extra pause between items, independent of the gate, with
                // jitter so a long batch does not settle into a fixed cadence.
                let jitter = rand::random::<f64>() * ITEM_PAUSE_JITTER_SECS;
                sleep(Duration::from_secs_f64(config.pause_secs.max(0.0) + jitter)).await;

                report
            }
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;

    pb.finish_and_clear();

    for report in &reports {
        if report.is_success() {
            summary.succeeded += 1;
            summary.total_rows += report.row_count;
        } else {
            summary.failed += 1;
        }
    }

    store::write_manifest(&config.out_dir.join("manifest.csv"), &reports)?;

    let failed: Vec<String> = reports
        .iter()
        .filter(|report| !report.is_success())
        .map(|report| report.symbol.clone())
        .collect();
    if !failed.is_empty() {
        store::write_failed_list(&config.out_dir.join("failed.csv"), &failed)?;
        warn!(failed = failed.len(), "some symbols failed, see failed.csv");
    }

    summary.reports = reports;
    Ok(summary)
}

/// Run one symbol through the retry loop and persist on success.
async fn download_one<S: QuoteSource>(
    source: &S,
    gate: &RateGate,
    symbol: &str,
    config: &BatchConfig,
) -> SymbolReport {
    match fetch_with_retry(source, gate, symbol, &config.start, &config.end, config.max_retries)
        .await
    {
        FetchOutcome::Fetched(rows) => {
            let file_name = format!("{}.csv", symbol);
            match store::write_history_csv(&config.out_dir.join(&file_name), &rows) {
                Ok(()) => {
                    let span = match (rows.first(), rows.last()) {
                        (Some(first), Some(last)) => {
                            format!("OK: {} -> {}", first.date_string(), last.date_string())
                        }
                        _ => "OK".to_string(),
                    };
                    SymbolReport::success(symbol, span, rows.len(), file_name)
                }
                Err(error) => SymbolReport::failure(symbol, format!("write failed: {}", error)),
            }
        }
        FetchOutcome::NoData => SymbolReport::failure(symbol, "no data returned".to_string()),
        FetchOutcome::ThrottleExhausted {
            attempts,
            last_wait_secs,
        } => SymbolReport::failure(
            symbol,
            format!("rate limited (retried {}x): last wait {}s", attempts, last_wait_secs),
        ),
        FetchOutcome::Failed(message) => SymbolReport::failure(symbol, message),
    }
}
