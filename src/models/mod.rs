mod ohlcv;
mod report;
mod symbol_info;

pub use ohlcv::Ohlcv;
pub use report::{FetchStatus, SymbolReport};
pub use symbol_info::{SymbolInfo, UNKNOWN};
