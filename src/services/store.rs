//! CSV persistence: per-symbol history files, the batch manifest, the
//! failed-symbols list, the symbols reference file, and the merge tool that
//! folds a directory of history files into one combined CSV.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::constants::RESERVED_FILE_STEMS;
use crate::error::{AppError, Result};
use crate::models::{Ohlcv, SymbolInfo, SymbolReport};

const HISTORY_HEADER: [&str; 6] = ["time", "open", "high", "low", "close", "volume"];

/// Write one symbol's history file.
pub fn write_history_csv(path: &Path, rows: &[Ohlcv]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HISTORY_HEADER)?;
    for row in rows {
        writer.write_record(&[
            row.date_string(),
            row.open.to_string(),
            row.high.to_string(),
            row.low.to_string(),
            row.close.to_string(),
            row.volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Stems of per-symbol history files already present in the output directory.
pub fn downloaded_symbols(dir: &Path) -> Result<HashSet<String>> {
    let mut stems = HashSet::new();
    if !dir.exists() {
        return Ok(stems);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if RESERVED_FILE_STEMS.contains(&stem) {
            continue;
        }
        stems.insert(stem.to_string());
    }
    Ok(stems)
}

/// Write the end-of-run manifest, one row per work item in completion order.
pub fn write_manifest(path: &Path, reports: &[SymbolReport]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["symbol", "status", "message", "row_count", "file"])?;
    for report in reports {
        writer.write_record(&[
            report.symbol.clone(),
            report.status.as_str().to_string(),
            report.message.clone(),
            report.row_count.to_string(),
            report.file.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the failed-symbols list for convenient re-runs.
pub fn write_failed_list(path: &Path, symbols: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["symbol"])?;
    for symbol in symbols {
        writer.write_record([symbol.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the active-symbols reference list.
pub fn write_symbols_csv(path: &Path, symbols: &[SymbolInfo]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "symbol",
        "exchange",
        "industry",
        "ecosystem",
        "organ_name",
        "last_trade_date",
    ])?;
    for info in symbols {
        writer.write_record(&[
            info.symbol.clone(),
            info.exchange.clone(),
            info.industry.clone(),
            info.ecosystem.clone(),
            info.organ_name.clone().unwrap_or_default(),
            info.last_trade_date.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Outcome of merging per-symbol files into one combined CSV.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub files_merged: usize,
    pub rows_written: usize,
    /// (file name, error) for files that could not be read.
    pub failures: Vec<(String, String)>,
}

/// Merge every per-symbol history CSV in `input_dir` into one file, sorted by
/// (symbol, time). The symbol comes from the file stem and is appended as a
/// trailing column unless `add_symbol_column` is off.
pub fn merge_history_dir(
    input_dir: &Path,
    output: &Path,
    add_symbol_column: bool,
) -> Result<MergeSummary> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(input_dir)
        .map_err(|e| AppError::Io(format!("Failed to read {}: {}", input_dir.display(), e)))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if RESERVED_FILE_STEMS.contains(&stem) {
            continue;
        }
        files.push(path);
    }
    files.sort();

    if files.is_empty() {
        return Err(AppError::NotFound(format!(
            "no history files in {}",
            input_dir.display()
        )));
    }

    let mut summary = MergeSummary::default();
    let mut rows: Vec<(String, Vec<String>)> = Vec::new();

    for path in &files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let symbol = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        match read_raw_rows(path) {
            Ok(file_rows) => {
                summary.files_merged += 1;
                for fields in file_rows {
                    rows.push((symbol.clone(), fields));
                }
            }
            Err(error) => {
                warn!(file = %name, error = %error, "skipping unreadable history file");
                summary.failures.push((name, error.to_string()));
            }
        }
    }

    // Lexicographic comparison is chronological here because times are ISO
    // dates.
    rows.sort_by(|a, b| (&a.0, &a.1[0]).cmp(&(&b.0, &b.1[0])));

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(output)?;
    let mut header: Vec<&str> = HISTORY_HEADER.to_vec();
    if add_symbol_column {
        header.push("symbol");
    }
    writer.write_record(&header)?;

    for (symbol, mut fields) in rows {
        if add_symbol_column {
            fields.push(symbol);
        }
        writer.write_record(&fields)?;
        summary.rows_written += 1;
    }
    writer.flush()?;

    Ok(summary)
}

fn read_raw_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() < HISTORY_HEADER.len() {
            return Err(AppError::Parse(format!(
                "short record in {}",
                path.display()
            )));
        }
        rows.push(
            record
                .iter()
                .take(HISTORY_HEADER.len())
                .map(|field| field.to_string())
                .collect(),
        );
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn bar(day: i64, close: f64) -> Ohlcv {
        Ohlcv {
            time: DateTime::<Utc>::from_timestamp(1_704_067_200 + day * 86_400, 0).unwrap(),
            open: close - 0.5,
            high: close + 0.5,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vneod-store-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn merge_sorts_by_symbol_then_time_and_appends_symbol() {
        let dir = temp_dir("merge");
        write_history_csv(&dir.join("BBB.csv"), &[bar(0, 10.0)]).unwrap();
        write_history_csv(&dir.join("AAA.csv"), &[bar(1, 21.0), bar(0, 20.0)]).unwrap();
        // Reserved files must not leak into the combined output.
        write_failed_list(&dir.join("failed.csv"), &["ZZZ".to_string()]).unwrap();

        let output = dir.join("combined").join("all.csv");
        let summary = merge_history_dir(&dir, &output, true).unwrap();

        assert_eq!(summary.files_merged, 2);
        assert_eq!(summary.rows_written, 3);
        assert!(summary.failures.is_empty());

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,open,high,low,close,volume,symbol");
        assert!(lines[1].starts_with("2024-01-01") && lines[1].ends_with("AAA"));
        assert!(lines[2].starts_with("2024-01-02") && lines[2].ends_with("AAA"));
        assert!(lines[3].ends_with("BBB"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn merge_without_symbol_column_keeps_the_plain_header() {
        let dir = temp_dir("merge-plain");
        write_history_csv(&dir.join("AAA.csv"), &[bar(0, 20.0)]).unwrap();

        let output = dir.join("all.csv");
        merge_history_dir(&dir, &output, false).unwrap();

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.starts_with("time,open,high,low,close,volume\n"));
        assert!(!content.contains("AAA"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn downloaded_symbols_skips_reserved_stems() {
        let dir = temp_dir("stems");
        write_history_csv(&dir.join("AAA.csv"), &[bar(0, 10.0)]).unwrap();
        write_failed_list(&dir.join("failed.csv"), &[]).unwrap();
        fs::write(dir.join("notes.txt"), "not a csv").unwrap();

        let stems = downloaded_symbols(&dir).unwrap();
        assert_eq!(stems.len(), 1);
        assert!(stems.contains("AAA"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn merge_reports_unreadable_files_without_aborting() {
        let dir = temp_dir("merge-bad");
        write_history_csv(&dir.join("AAA.csv"), &[bar(0, 10.0)]).unwrap();
        fs::write(dir.join("BAD.csv"), "time,open\n2024-01-01,1.0\n").unwrap();

        let output = dir.join("all.csv");
        let summary = merge_history_dir(&dir, &output, true).unwrap();

        assert_eq!(summary.files_merged, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "BAD.csv");

        let _ = fs::remove_dir_all(&dir);
    }
}
