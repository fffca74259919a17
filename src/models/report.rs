/// Terminal status of one work item, as recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "SUCCESS",
            FetchStatus::Failed => "FAILED",
        }
    }
}

/// Per-symbol outcome row, collected in completion order and written to
/// `manifest.csv` once the batch ends.
#[derive(Debug, Clone)]
pub struct SymbolReport {
    pub symbol: String,
    pub status: FetchStatus,
    pub message: String,
    pub row_count: usize,
    /// Output file name; `None` when nothing was written.
    pub file: Option<String>,
}

impl SymbolReport {
    pub fn success(symbol: &str, message: String, row_count: usize, file: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: FetchStatus::Success,
            message,
            row_count,
            file: Some(file),
        }
    }

    pub fn failure(symbol: &str, message: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: FetchStatus::Failed,
            message,
            row_count: 0,
            file: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}
