use chrono::{DateTime, Utc};
use serde::Serialize;

/// One daily OHLCV bar as returned by the quote-history source.
#[derive(Debug, Clone, Serialize)]
pub struct Ohlcv {
    #[serde(serialize_with = "serialize_time_as_date")]
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Ohlcv {
    /// Trading date as `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.time.format("%Y-%m-%d").to_string()
    }
}

fn serialize_time_as_date<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let date_string = time.format("%Y-%m-%d").to_string();
    serializer.serialize_str(&date_string)
}
