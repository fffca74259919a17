use std::path::PathBuf;

use crate::services::store;

pub fn run(input: PathBuf, output: PathBuf, no_symbol: bool) {
    println!("🔗 Merging history files from {} into {}", input.display(), output.display());

    match store::merge_history_dir(&input, &output, !no_symbol) {
        Ok(summary) => {
            println!("\n[SUMMARY]");
            println!("  - Files merged: {}", summary.files_merged);
            println!("  - Rows written: {}", summary.rows_written);
            println!("  - Output: {}", output.display());
            if !summary.failures.is_empty() {
                println!("  - Unreadable files: {}", summary.failures.len());
                for (name, error) in summary.failures.iter().take(10) {
                    println!("      {}: {}", name, error);
                }
                if summary.failures.len() > 10 {
                    println!("      ... and {} more", summary.failures.len() - 10);
                }
            }
        }
        Err(error) => {
            eprintln!("❌ Merge failed: {}", error);
            std::process::exit(1);
        }
    }
}
