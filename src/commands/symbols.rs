use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::services::listing::{self, ListingConfig, ListingSummary};
use crate::services::vci::VciClient;

pub fn run(output: PathBuf, no_check_trading: bool, days_back: i64, families: PathBuf) {
    match run_symbols(output, no_check_trading, days_back, families) {
        Ok(summary) => print_summary(&summary),
        Err(error) => {
            eprintln!("❌ Symbol listing failed: {}", error);
            std::process::exit(1);
        }
    }
}

fn run_symbols(
    output: PathBuf,
    no_check_trading: bool,
    days_back: i64,
    families: PathBuf,
) -> Result<ListingSummary> {
    println!("📋 Building active symbols list -> {}", output.display());
    if !no_check_trading {
        println!(
            "   Probing trading activity over the last {} days (this takes a while for ~1700 symbols)",
            days_back
        );
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let client = VciClient::new(true)
            .map_err(|e| AppError::Config(format!("Failed to create VCI client: {}", e)))?;

        let listed = client.all_symbols().await.map_err(AppError::from)?;
        if listed.is_empty() {
            return Err(AppError::NotFound("symbol listing came back empty".to_string()));
        }

        let config = ListingConfig {
            output,
            check_trading: !no_check_trading,
            days_back,
            families,
        };

        listing::build_reference(&client, listed, &config).await
    })
}

fn print_summary(summary: &ListingSummary) {
    println!("\n[SUMMARY]");
    println!("  - Listed symbols:  {}", summary.listed);
    println!("  - Written:         {}", summary.written);
    println!("  - Dropped inactive: {}", summary.dropped_inactive);
}
