//! Command-line utilities that pull Vietnamese stock-market reference and
//! historical price data from the VCI market-data API and persist it as CSV
//! files on local disk.
//!
//! The interesting part is the throttle-aware fetch pipeline: a shared
//! [`services::RateGate`] paces outbound requests, [`services::backoff`]
//! classifies the provider's free-text errors, and the retry loop in
//! [`services::history`] ties both together per symbol.

pub mod cli;
pub mod commands;
pub mod constants;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
