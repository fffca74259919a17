//! Shared tuning knobs and provider phrase tables.
//!
//! The throttle phrase list is data, not control flow: when the provider
//! changes its wording, the new phrase is added here and the retry logic is
//! untouched.

/// Free-text fragments that mark a provider error as rate limiting.
/// Matched case-insensitively against the full error message.
pub const THROTTLE_PHRASES: &[&str] = &[
    "rate limit",
    "too many request",
    "quá nhiều request",
    "thử lại sau",
    "retry after",
    "process terminated",
];

/// Seconds added on top of a provider-stated wait time.
pub const WAIT_HINT_BUFFER_SECS: u64 = 5;

/// Base of the exponential backoff used when the provider states no wait
/// time: 15s, 30s, 60s, 120s, ...
pub const BACKOFF_BASE_SECS: u64 = 15;

/// Hard ceiling on fetch attempts per symbol.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Minimum spacing between consecutive provider requests, shared across all
/// workers.
pub const DEFAULT_MIN_REQUEST_INTERVAL_SECS: f64 = 2.0;

/// Default pause after each completed symbol, on top of the request gate.
pub const DEFAULT_ITEM_PAUSE_SECS: f64 = 2.0;

/// Upper bound of the random jitter added to the per-item pause.
pub const ITEM_PAUSE_JITTER_SECS: f64 = 0.5;

/// Listed tickers are exactly three characters; anything longer is a bond,
/// warrant or fund certificate and is skipped.
pub const TICKER_LEN: usize = 3;

/// How often the symbols command flushes partial results to disk.
pub const INCREMENTAL_SAVE_EVERY: usize = 20;

/// Display truncation for provider error messages in the manifest.
pub const MESSAGE_TRUNCATE_LEN: usize = 100;

/// File stems in the data directory that are not per-symbol history files.
pub const RESERVED_FILE_STEMS: &[&str] = &["manifest", "failed", "all_stocks", "active_stocks"];
