/// Sentinel for reference fields the provider did not populate.
pub const UNKNOWN: &str = "UNKNOWN";

/// One row of the active-symbols reference list: which board a ticker trades
/// on, its ICB industry, the parent group ("ecosystem") it belongs to, and
/// the company name.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub symbol: String,
    pub exchange: String,
    pub industry: String,
    pub ecosystem: String,
    pub organ_name: Option<String>,
    /// Last observed trading date, set by the activity probe.
    pub last_trade_date: Option<String>,
}

impl SymbolInfo {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange: UNKNOWN.to_string(),
            industry: UNKNOWN.to_string(),
            ecosystem: UNKNOWN.to_string(),
            organ_name: None,
            last_trade_date: None,
        }
    }
}
