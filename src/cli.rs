use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser)]
#[command(name = "vneod")]
#[command(about = "Vietnamese stock market EOD data downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download daily history for every listed symbol
    Pull {
        /// Start date (YYYY-MM-DD)
        #[arg(long, default_value = "1990-01-01")]
        start: String,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,
        /// Output directory for per-symbol CSV files
        #[arg(long, default_value = "data/eod")]
        out: PathBuf,
        /// Concurrent workers (keep low, the provider throttles aggressively)
        #[arg(long, default_value_t = 1)]
        workers: usize,
        /// Pause between completed symbols, in seconds
        #[arg(long, default_value_t = 2.0)]
        sleep: f64,
    },
    /// Download the VN30 index series
    Vn30 {
        /// Start date (YYYY-MM-DD)
        #[arg(long, default_value = "1990-01-01")]
        start: String,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,
        /// Output directory
        #[arg(long, default_value = "data/eod")]
        out: PathBuf,
        /// Minimum spacing between requests, in seconds
        #[arg(long, default_value_t = 2.0)]
        sleep: f64,
        /// Re-download even when the output file exists
        #[arg(long)]
        force: bool,
    },
    /// Build the active-symbols reference CSV
    Symbols {
        /// Output CSV file
        #[arg(long, default_value = "data/active_stocks.csv")]
        output: PathBuf,
        /// Skip the trading-activity probe and keep every listed symbol
        #[arg(long)]
        no_check_trading: bool,
        /// Days of recent history that count as active
        #[arg(long, default_value_t = 90)]
        days_back: i64,
        /// Ecosystem mapping CSV (family,symbols)
        #[arg(long, default_value = "vietnam_stock_families.csv")]
        families: PathBuf,
    },
    /// Merge per-symbol history CSVs into one combined file
    Merge {
        /// Directory containing the per-symbol CSV files
        #[arg(long, default_value = "data/eod")]
        input: PathBuf,
        /// Combined output CSV
        #[arg(long, default_value = "data/all_stocks.csv")]
        output: PathBuf,
        /// Do not append the symbol column
        #[arg(long)]
        no_symbol: bool,
    },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Pull {
            start,
            end,
            out,
            workers,
            sleep,
        } => {
            commands::pull::run(start, end, out, workers, sleep);
        }
        Commands::Vn30 {
            start,
            end,
            out,
            sleep,
            force,
        } => {
            commands::vn30::run(start, end, out, sleep, force);
        }
        Commands::Symbols {
            output,
            no_check_trading,
            days_back,
            families,
        } => {
            commands::symbols::run(output, no_check_trading, days_back, families);
        }
        Commands::Merge {
            input,
            output,
            no_symbol,
        } => {
            commands::merge::run(input, output, no_symbol);
        }
    }
}
