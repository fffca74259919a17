pub mod backoff;
pub mod batch;
pub mod history;
pub mod listing;
pub mod rate_gate;
pub mod store;
pub mod vci;

pub use backoff::Classification;
pub use batch::{BatchConfig, BatchSummary};
pub use history::{fetch_with_retry, FetchOutcome, QuoteSource};
pub use listing::{ListingConfig, ListingSummary};
pub use rate_gate::RateGate;
pub use vci::{ListedSymbol, VciClient, VciError};
