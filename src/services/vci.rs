use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use isahc::{config::Configurable, prelude::*, HttpClient};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use tracing::debug;

use crate::error::AppError;
use crate::models::Ohlcv;
use crate::services::history::QuoteSource;

#[derive(Debug)]
pub enum VciError {
    Http(isahc::Error),
    Serialization(serde_json::Error),
    InvalidInterval(String),
    InvalidDate(String),
    InvalidResponse(String),
    RateLimit(String),
    NoData,
}

impl From<isahc::Error> for VciError {
    fn from(error: isahc::Error) -> Self {
        VciError::Http(error)
    }
}

impl From<serde_json::Error> for VciError {
    fn from(error: serde_json::Error) -> Self {
        VciError::Serialization(error)
    }
}

impl std::fmt::Display for VciError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VciError::Http(e) => write!(f, "HTTP error: {}", e),
            VciError::Serialization(e) => write!(f, "Serialization error: {}", e),
            VciError::InvalidInterval(s) => write!(f, "Invalid interval: {}", s),
            VciError::InvalidDate(s) => write!(f, "Invalid date: {}", s),
            VciError::InvalidResponse(s) => write!(f, "Invalid response: {}", s),
            VciError::RateLimit(s) => write!(f, "Rate limit exceeded: {}", s),
            VciError::NoData => write!(f, "No data available"),
        }
    }
}

impl std::error::Error for VciError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VciError::Http(e) => Some(e),
            VciError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VciError> for AppError {
    fn from(error: VciError) -> Self {
        AppError::Network(error.to_string())
    }
}

/// One entry from the provider's company listing.
#[derive(Debug, Clone)]
pub struct ListedSymbol {
    pub symbol: String,
    pub organ_name: Option<String>,
    pub exchange: Option<String>,
    pub industry: Option<String>,
}

/// Thin client for the VCI trading API.
///
/// Issues exactly one request per call: pacing, throttle classification and
/// retries all live with the caller, so a throttled response surfaces as an
/// error whose text carries whatever wait hint the provider sent.
#[derive(Clone)]
pub struct VciClient {
    client: HttpClient,
    base_url: String,
    user_agents: Vec<String>,
    random_agent: bool,
}

impl VciClient {
    pub fn new(random_agent: bool) -> Result<Self, VciError> {
        let client = HttpClient::builder()
            .timeout(StdDuration::from_secs(30))
            .build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0".to_string(),
        ];

        Ok(VciClient {
            client,
            base_url: "https://trading.vietcap.com.vn/api/".to_string(),
            user_agents,
            random_agent,
        })
    }

    fn get_interval_value(&self, interval: &str) -> Result<String, VciError> {
        let interval_map = HashMap::from([
            ("1m", "ONE_MINUTE"),
            ("1H", "ONE_HOUR"),
            ("1D", "ONE_DAY"),
        ]);

        interval_map
            .get(interval)
            .map(|s| s.to_string())
            .ok_or_else(|| VciError::InvalidInterval(interval.to_string()))
    }

    fn get_user_agent(&self) -> String {
        if self.random_agent {
            use rand::seq::SliceRandom;
            self.user_agents
                .choose(&mut rand::thread_rng())
                .unwrap_or(&self.user_agents[0])
                .clone()
        } else {
            self.user_agents[0].clone()
        }
    }

    async fn make_request(&self, url: &str, payload: &Value) -> Result<Value, VciError> {
        let user_agent = self.get_user_agent();
        let body = serde_json::to_string(payload)?;

        debug!(url, payload_size = body.len(), "VCI request");

        let request = isahc::Request::builder()
            .uri(url)
            .method("POST")
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9,vi-VN;q=0.8,vi;q=0.7")
            .header("Content-Type", "application/json")
            .header("User-Agent", &user_agent)
            .header("Referer", "https://trading.vietcap.com.vn/")
            .header("Origin", "https://trading.vietcap.com.vn")
            .body(body)
            .map_err(|e| VciError::InvalidResponse(format!("Request build error: {}", e)))?;

        let mut response = self.client.send_async(request).await?;
        let status = response.status();

        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| VciError::InvalidResponse(format!("Response body error: {}", e)))?;
            return serde_json::from_str::<Value>(&text).map_err(VciError::from);
        }

        // Throttling arrives as free message text; keep the body so the
        // caller can read any wait hint out of it.
        let body_text = response.text().await.unwrap_or_default();
        let snippet: String = body_text.chars().take(200).collect();
        if status == 429 || status == 403 {
            Err(VciError::RateLimit(format!(
                "too many requests (HTTP {}): {}",
                status.as_u16(),
                snippet
            )))
        } else {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            Err(VciError::InvalidResponse(format!(
                "HTTP {} - {}: {}",
                status.as_u16(),
                reason,
                snippet
            )))
        }
    }

    fn calculate_timestamp(&self, date: Option<&str>) -> Result<i64, VciError> {
        match date {
            Some(date) => {
                let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| VciError::InvalidDate(format!("{}: {}", date, e)))?;
                let end_of_day = naive
                    .and_hms_opt(23, 59, 59)
                    .ok_or_else(|| VciError::InvalidDate(date.to_string()))?;
                Ok(end_of_day.and_utc().timestamp())
            }
            None => {
                let now = Utc::now();
                let end_of_day = now
                    .date_naive()
                    .and_hms_opt(23, 59, 59)
                    .unwrap_or_else(|| now.naive_utc());
                Ok(end_of_day.and_utc().timestamp())
            }
        }
    }

    fn calculate_count_back(
        &self,
        start: &str,
        end: Option<&str>,
        interval: &str,
    ) -> Result<u32, VciError> {
        let start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .map_err(|e| VciError::InvalidDate(format!("{}: {}", start, e)))?;
        let end_date = match end {
            Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| VciError::InvalidDate(format!("{}: {}", date, e)))?,
            None => Utc::now().date_naive(),
        };

        let mut business_days = 0u32;
        let mut current = start_date;
        while current <= end_date {
            let weekday = current.weekday().num_days_from_sunday();
            if weekday != 0 && weekday != 6 {
                business_days += 1;
            }
            current += ChronoDuration::days(1);
        }

        // The chart endpoint under-returns without a generous buffer.
        let count_back = match interval {
            "1D" => business_days + 100,
            "1H" => ((business_days as f32 * 6.5) as u32) + 100,
            _ => ((business_days as f32 * 6.5 * 60.0) as u32) + 100,
        };

        Ok(count_back)
    }

    /// Fetch the OHLCV series for one symbol, filtered to `start` and later,
    /// sorted by time. Empty responses surface as [`VciError::NoData`].
    pub async fn get_history(
        &self,
        symbol: &str,
        start: &str,
        end: Option<&str>,
        interval: &str,
    ) -> Result<Vec<Ohlcv>, VciError> {
        let interval_value = self.get_interval_value(interval)?;
        let end_timestamp = self.calculate_timestamp(end)?;
        let count_back = self.calculate_count_back(start, end, interval)?;
        let start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .map_err(|e| VciError::InvalidDate(format!("{}: {}", start, e)))?;

        let url = format!("{}chart/OHLCChart/gap-chart", self.base_url);
        let payload = serde_json::json!({
            "timeFrame": interval_value,
            "symbols": [symbol],
            "to": end_timestamp,
            "countBack": count_back,
        });

        debug!(symbol, start, end = ?end, interval, count_back, "requesting history");

        let response = self.make_request(&url, &payload).await?;
        parse_history_payload(&response, start_date)
    }

    /// Listing of all tradable companies with exchange and industry metadata.
    pub async fn all_symbols(&self) -> Result<Vec<ListedSymbol>, VciError> {
        let url = self.base_url.replace("/api/", "/data-mt/") + "graphql";

        let graphql_query = r#"query Query {
  CompaniesListingInfo {
    ticker
    organName
    enOrganName
    icbName3
    comGroupCode
    __typename
  }
}"#;

        let payload = serde_json::json!({
            "query": graphql_query,
            "variables": {},
        });

        let response = self.make_request(&url, &payload).await?;
        let data = response.get("data").ok_or(VciError::NoData)?;
        let companies = data
            .get("CompaniesListingInfo")
            .and_then(|v| v.as_array())
            .ok_or(VciError::NoData)?;

        let mut result = Vec::with_capacity(companies.len());
        for company in companies {
            let Some(ticker) = company.get("ticker").and_then(|v| v.as_str()) else {
                continue;
            };
            let field = |key: &str| {
                company
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            result.push(ListedSymbol {
                symbol: ticker.trim().to_uppercase(),
                organ_name: field("organName"),
                exchange: field("comGroupCode"),
                industry: field("icbName3"),
            });
        }

        Ok(result)
    }
}

impl QuoteSource for VciClient {
    async fn history(&self, symbol: &str, start: &str, end: &str) -> crate::error::Result<Vec<Ohlcv>> {
        match self.get_history(symbol, start, Some(end), "1D").await {
            Ok(rows) => Ok(rows),
            // Absence of data is an answer, not an error, for the retry loop.
            Err(VciError::NoData) => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Decode the chart endpoint's column-array payload into rows at or after
/// `start_date`, sorted by time.
fn parse_history_payload(response: &Value, start_date: NaiveDate) -> Result<Vec<Ohlcv>, VciError> {
    let items = response.as_array().ok_or(VciError::NoData)?;
    let data_item = items.first().ok_or(VciError::NoData)?;

    for key in ["o", "h", "l", "c", "v", "t"] {
        if data_item.get(key).is_none() {
            return Err(VciError::InvalidResponse(format!("Missing key: {}", key)));
        }
    }

    let column = |key: &str| {
        data_item[key]
            .as_array()
            .ok_or_else(|| VciError::InvalidResponse(format!("Invalid column: {}", key)))
    };
    let opens = column("o")?;
    let highs = column("h")?;
    let lows = column("l")?;
    let closes = column("c")?;
    let volumes = column("v")?;
    let times = column("t")?;

    let length = times.len();
    if [opens.len(), highs.len(), lows.len(), closes.len(), volumes.len()]
        .iter()
        .any(|&len| len != length)
    {
        return Err(VciError::InvalidResponse(
            "Inconsistent array lengths".to_string(),
        ));
    }

    let mut result = Vec::with_capacity(length);
    for i in 0..length {
        // Timestamps arrive either as strings or as integers.
        let timestamp = if let Some(ts) = times[i].as_str() {
            ts.parse::<i64>().map_err(|_| {
                VciError::InvalidResponse(format!("Bad timestamp '{}' at index {}", ts, i))
            })?
        } else if let Some(ts) = times[i].as_i64() {
            ts
        } else {
            return Err(VciError::InvalidResponse(format!(
                "Bad timestamp at index {}",
                i
            )));
        };

        let time = DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
            VciError::InvalidResponse(format!("Timestamp {} out of range", timestamp))
        })?;

        if time.date_naive() >= start_date {
            result.push(Ohlcv {
                time,
                open: opens[i].as_f64().unwrap_or(0.0),
                high: highs[i].as_f64().unwrap_or(0.0),
                low: lows[i].as_f64().unwrap_or(0.0),
                close: closes[i].as_f64().unwrap_or(0.0),
                volume: volumes[i].as_u64().unwrap_or(0),
            });
        }
    }

    result.sort_by(|a, b| a.time.cmp(&b.time));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_mapping() {
        let client = VciClient::new(false).unwrap();
        assert_eq!(client.get_interval_value("1D").unwrap(), "ONE_DAY");
        assert_eq!(client.get_interval_value("1H").unwrap(), "ONE_HOUR");
        assert!(client.get_interval_value("weekly").is_err());
    }

    #[test]
    fn parses_and_filters_history_payload() {
        // 2024-01-02, 2024-01-03, 2024-01-04 as unix timestamps; the middle
        // one is a string, which the API also produces.
        let payload = serde_json::json!([{
            "o": [10.0, 11.0, 12.0],
            "h": [10.5, 11.5, 12.5],
            "l": [9.5, 10.5, 11.5],
            "c": [10.2, 11.2, 12.2],
            "v": [1000, 2000, 3000],
            "t": [1704153600i64, "1704240000", 1704326400i64],
        }]);

        let start = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let rows = parse_history_payload(&payload, start).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date_string(), "2024-01-03");
        assert_eq!(rows[1].date_string(), "2024-01-04");
        assert!((rows[0].open - 11.0).abs() < 1e-9);
        assert_eq!(rows[1].volume, 3000);
    }

    #[test]
    fn empty_payload_is_no_data() {
        let payload = serde_json::json!([]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            parse_history_payload(&payload, start),
            Err(VciError::NoData)
        ));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let payload = serde_json::json!([{
            "o": [10.0],
            "h": [10.5, 11.0],
            "l": [9.5],
            "c": [10.2],
            "v": [1000],
            "t": [1704153600i64],
        }]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            parse_history_payload(&payload, start),
            Err(VciError::InvalidResponse(_))
        ));
    }
}
