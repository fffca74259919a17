use std::path::PathBuf;

use crate::constants::DEFAULT_MAX_RETRIES;
use crate::error::{AppError, Result};
use crate::services::history::{fetch_with_retry, FetchOutcome};
use crate::services::rate_gate::RateGate;
use crate::services::store;
use crate::services::vci::VciClient;
use crate::utils::{parse_date, today_string};

const INDEX_SYMBOL: &str = "VN30";

pub fn run(start: String, end: Option<String>, out: PathBuf, sleep: f64, force: bool) {
    match run_vn30(start, end, out, sleep, force) {
        Ok(()) => {}
        Err(error) => {
            eprintln!("❌ {} download failed: {}", INDEX_SYMBOL, error);
            std::process::exit(1);
        }
    }
}

fn run_vn30(start: String, end: Option<String>, out: PathBuf, sleep: f64, force: bool) -> Result<()> {
    let end = end.unwrap_or_else(today_string);
    parse_date(&start)?;
    parse_date(&end)?;

    std::fs::create_dir_all(&out)?;
    let file_name = format!("{}.csv", INDEX_SYMBOL);
    let path = out.join(&file_name);
    if path.exists() && !force {
        println!("✅ {} already exists, use --force to re-download", path.display());
        return Ok(());
    }

    println!("📥 Downloading {} from {} to {}", INDEX_SYMBOL, start, end);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let client = VciClient::new(true)
            .map_err(|e| AppError::Config(format!("Failed to create VCI client: {}", e)))?;
        let gate = RateGate::from_secs(sleep);

        match fetch_with_retry(&client, &gate, INDEX_SYMBOL, &start, &end, DEFAULT_MAX_RETRIES)
            .await
        {
            FetchOutcome::Fetched(rows) => {
                store::write_history_csv(&path, &rows)?;
                println!("\n✅ Download finished");
                println!("  - Symbol: {}", INDEX_SYMBOL);
                println!("  - Rows: {}", rows.len());
                if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
                    println!("  - Range: {} -> {}", first.date_string(), last.date_string());
                }
                println!("  - File: {}", path.display());
                Ok(())
            }
            FetchOutcome::NoData => Err(AppError::NotFound(format!(
                "no data returned for {}",
                INDEX_SYMBOL
            ))),
            FetchOutcome::ThrottleExhausted {
                attempts,
                last_wait_secs,
            } => Err(AppError::Network(format!(
                "rate limited (retried {}x), last wait {}s",
                attempts, last_wait_secs
            ))),
            FetchOutcome::Failed(message) => Err(AppError::Other(message)),
        }
    })
}
