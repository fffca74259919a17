//! Builds the active-symbols reference list: which tickers trade on which
//! board, their ICB industry, their parent group, and whether they still
//! trade at all.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_MIN_REQUEST_INTERVAL_SECS, INCREMENTAL_SAVE_EVERY, TICKER_LEN,
};
use crate::error::Result;
use crate::models::{SymbolInfo, UNKNOWN};
use crate::services::history::{fetch_with_retry, FetchOutcome, QuoteSource};
use crate::services::rate_gate::RateGate;
use crate::services::store;
use crate::services::vci::ListedSymbol;

/// Settings for building the reference list.
pub struct ListingConfig {
    pub output: PathBuf,
    pub check_trading: bool,
    pub days_back: i64,
    pub families: PathBuf,
}

#[derive(Debug, Default)]
pub struct ListingSummary {
    pub listed: usize,
    pub written: usize,
    pub dropped_inactive: usize,
}

/// Map a raw provider board code onto the three Vietnamese exchanges.
pub fn normalize_exchange(raw: &str) -> Option<&'static str> {
    match raw.trim().to_uppercase().as_str() {
        "HOSE" | "HSX" => Some("HOSE"),
        "HNX" => Some("HNX"),
        "UPCOM" => Some("UPCOM"),
        _ => None,
    }
}

/// Load the ecosystem (parent-group) mapping: a CSV with header
/// `family,symbols` where `symbols` is a comma-separated ticker list.
pub fn load_family_map(path: &Path) -> HashMap<String, String> {
    let mut mapping = HashMap::new();
    if !path.exists() {
        warn!(file = %path.display(), "family mapping file not found, ecosystems stay UNKNOWN");
        return mapping;
    }
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(error) => {
            warn!(file = %path.display(), error = %error, "could not read family mapping");
            return mapping;
        }
    };
    for record in reader.records().flatten() {
        if record.len() < 2 {
            continue;
        }
        let family = record[0].trim().to_uppercase();
        if family.is_empty() {
            continue;
        }
        for symbol in record[1].split(',') {
            let symbol = symbol.trim().to_uppercase();
            if symbol.len() == TICKER_LEN {
                mapping.insert(symbol, family.clone());
            }
        }
    }
    mapping
}

/// Load a previous run's output so already-known fields survive provider
/// gaps.
pub fn load_existing(path: &Path) -> HashMap<String, SymbolInfo> {
    let mut existing = HashMap::new();
    if !path.exists() {
        return existing;
    }
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(_) => return existing,
    };
    for record in reader.records().flatten() {
        if record.len() < 6 {
            continue;
        }
        let info = SymbolInfo {
            symbol: record[0].trim().to_uppercase(),
            exchange: record[1].trim().to_string(),
            industry: record[2].trim().to_string(),
            ecosystem: record[3].trim().to_string(),
            organ_name: non_empty(&record[4]),
            last_trade_date: non_empty(&record[5]),
        };
        existing.insert(info.symbol.clone(), info);
    }
    existing
}

fn non_empty(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_known(value: &str) -> bool {
    !value.is_empty() && value != UNKNOWN
}

/// Fold provider listing, family mapping and previous output into the final
/// reference records. Missing fields become `UNKNOWN`.
pub fn build_records(
    listed: &[ListedSymbol],
    families: &HashMap<String, String>,
    existing: &HashMap<String, SymbolInfo>,
) -> Vec<SymbolInfo> {
    let mut records = Vec::new();
    for entry in listed {
        let symbol = entry.symbol.trim().to_uppercase();
        if symbol.len() != TICKER_LEN || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            continue;
        }

        let mut info = SymbolInfo::new(&symbol);
        if let Some(exchange) = entry.exchange.as_deref().and_then(normalize_exchange) {
            info.exchange = exchange.to_string();
        }
        if let Some(industry) = entry
            .industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            info.industry = industry.to_string();
        }
        info.organ_name = entry.organ_name.clone();
        if let Some(family) = families.get(&symbol) {
            info.ecosystem = family.clone();
        }

        // Values crawled earlier fill provider gaps, never the reverse.
        if let Some(prev) = existing.get(&symbol) {
            if !is_known(&info.exchange) && is_known(&prev.exchange) {
                info.exchange = prev.exchange.clone();
            }
            if !is_known(&info.industry) && is_known(&prev.industry) {
                info.industry = prev.industry.clone();
            }
            if !is_known(&info.ecosystem) && is_known(&prev.ecosystem) {
                info.ecosystem = prev.ecosystem.clone();
            }
            if info.organ_name.is_none() {
                info.organ_name = prev.organ_name.clone();
            }
        }

        records.push(info);
    }

    records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    records.dedup_by(|a, b| a.symbol == b.symbol);
    records
}

/// Build and persist the reference CSV. With `check_trading` on, every
/// symbol's recent history is probed through the shared gate and symbols
/// without a trade inside the window are dropped.
pub async fn build_reference<S: QuoteSource>(
    source: &S,
    listed: Vec<ListedSymbol>,
    config: &ListingConfig,
) -> Result<ListingSummary> {
    let families = load_family_map(&config.families);
    if !families.is_empty() {
        info!(mappings = families.len(), "loaded ecosystem mappings");
    }
    let existing = load_existing(&config.output);
    if !existing.is_empty() {
        info!(symbols = existing.len(), "loaded previous reference data");
    }

    let records = build_records(&listed, &families, &existing);
    let mut summary = ListingSummary {
        listed: records.len(),
        ..Default::default()
    };
    info!(provider = listed.len(), kept = records.len(), "collected listed symbols");

    if !config.check_trading {
        store::write_symbols_csv(&config.output, &records)?;
        summary.written = records.len();
        return Ok(summary);
    }

    let end = Utc::now().date_naive();
    let start = (end - chrono::Duration::days(config.days_back))
        .format("%Y-%m-%d")
        .to_string();
    let end = end.format("%Y-%m-%d").to_string();

    let gate = RateGate::from_secs(DEFAULT_MIN_REQUEST_INTERVAL_SECS);
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut active = Vec::new();
    for (index, mut info) in records.into_iter().enumerate() {
        pb.set_message(info.symbol.clone());

        match fetch_with_retry(source, &gate, &info.symbol, &start, &end, DEFAULT_MAX_RETRIES).await
        {
            FetchOutcome::Fetched(rows) => {
                if let Some(last) = rows.last() {
                    info.last_trade_date = Some(last.date_string());
                }
                active.push(info);
            }
            FetchOutcome::NoData => {
                summary.dropped_inactive += 1;
            }
            FetchOutcome::ThrottleExhausted { attempts, .. } => {
                warn!(symbol = %info.symbol, attempts, "still throttled, treating as inactive");
                summary.dropped_inactive += 1;
            }
            FetchOutcome::Failed(message) => {
                warn!(symbol = %info.symbol, error = %message, "history probe failed, treating as inactive");
                summary.dropped_inactive += 1;
            }
        }
        pb.inc(1);

        // Flush partial progress so an interrupted run keeps what it has.
        if (index + 1) % INCREMENTAL_SAVE_EVERY == 0 && !active.is_empty() {
            store::write_symbols_csv(&config.output, &active)?;
        }
    }
    pb.finish_and_clear();

    store::write_symbols_csv(&config.output, &active)?;
    summary.written = active.len();
    Ok(summary)
}
