use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::services::batch::{self, BatchConfig, BatchSummary};
use crate::services::vci::VciClient;
use crate::utils::{parse_date, today_string};

pub fn run(start: String, end: Option<String>, out: PathBuf, workers: usize, sleep: f64) {
    match run_pull(start, end, out, workers, sleep) {
        Ok(summary) => print_summary(&summary),
        Err(error) => {
            eprintln!("❌ Download failed: {}", error);
            std::process::exit(1);
        }
    }
}

fn run_pull(
    start: String,
    end: Option<String>,
    out: PathBuf,
    workers: usize,
    sleep: f64,
) -> Result<BatchSummary> {
    let end = end.unwrap_or_else(today_string);
    parse_date(&start)?;
    parse_date(&end)?;

    println!("📥 Downloading daily history from {} to {}", start, end);
    println!("   Output: {}", out.display());
    println!("   Workers: {}, pause: {}s", workers, sleep);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let client = VciClient::new(true)
            .map_err(|e| AppError::Config(format!("Failed to create VCI client: {}", e)))?;

        let mut symbols: Vec<String> = client
            .all_symbols()
            .await
            .map_err(AppError::from)?
            .into_iter()
            .map(|entry| entry.symbol)
            .collect();
        symbols.sort();
        symbols.dedup();

        if symbols.is_empty() {
            return Err(AppError::NotFound("symbol listing came back empty".to_string()));
        }
        println!("   Found {} listed symbols", symbols.len());

        let mut config = BatchConfig::new(start, end, out);
        config.workers = workers;
        config.pause_secs = sleep;

        batch::download_all(&client, &symbols, &config).await
    })
}

fn print_summary(summary: &BatchSummary) {
    println!("\n[SUMMARY]");
    println!("  - Symbols requested: {}", summary.requested);
    println!("  - Already on disk:   {}", summary.skipped_existing);
    println!("  - Downloaded:        {}", summary.succeeded);
    println!("  - Failed:            {}", summary.failed);
    println!("  - Total rows:        {}", summary.total_rows);
    if summary.failed > 0 {
        println!("  - Failed symbols are listed in failed.csv");
    }
}
