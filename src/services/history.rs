//! Bounded retry loop for one unit of fetch work.
//!
//! Every attempt goes through the shared [`RateGate`] first. Throttling
//! errors wait out the provider's stated (or exponential fallback) delay and
//! retry; everything else ends the loop on the spot.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::constants::MESSAGE_TRUNCATE_LEN;
use crate::error::Result;
use crate::models::Ohlcv;
use crate::services::backoff::{self, Classification};
use crate::services::rate_gate::RateGate;
use crate::utils::truncate_message;

/// A remote source of daily price history. Implemented by the VCI client and
/// by scripted fakes in tests.
pub trait QuoteSource {
    /// Fetch the daily bars for `symbol` over the inclusive date range.
    /// An empty vector means the provider has nothing for this symbol.
    async fn history(&self, symbol: &str, start: &str, end: &str) -> Result<Vec<Ohlcv>>;
}

/// Terminal result of the fetch loop for one symbol.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Rows came back; the caller persists them.
    Fetched(Vec<Ohlcv>),
    /// The provider had nothing for this symbol. Not a throttling signal,
    /// so never retried.
    NoData,
    /// Still throttled after the whole attempt budget was spent.
    ThrottleExhausted { attempts: u32, last_wait_secs: u64 },
    /// Non-throttling failure, terminal on its first occurrence.
    Failed(String),
}

/// Fetch one symbol with provider-aware pacing.
///
/// At most `max_retries` attempts are made, never more. After each throttled
/// attempt the loop sleeps the computed wait and re-stamps the gate so the
/// next spacing check measures from the wake-up.
pub async fn fetch_with_retry<S: QuoteSource>(
    source: &S,
    gate: &RateGate,
    symbol: &str,
    start: &str,
    end: &str,
    max_retries: u32,
) -> FetchOutcome {
    let mut last_wait_secs = 0;

    for attempt in 0..max_retries {
        gate.acquire().await;

        let error = match source.history(symbol, start, end).await {
            Ok(rows) if rows.is_empty() => return FetchOutcome::NoData,
            Ok(rows) => return FetchOutcome::Fetched(rows),
            Err(error) => error,
        };

        let text = error.to_string();
        match backoff::classify(&text, attempt) {
            Classification::Fatal => {
                warn!(symbol, error = %text, "fetch failed");
                return FetchOutcome::Failed(truncate_message(&text, MESSAGE_TRUNCATE_LEN));
            }
            Classification::Throttled { wait_secs } => {
                last_wait_secs = wait_secs;
                if attempt + 1 == max_retries {
                    break;
                }
                info!(
                    symbol,
                    wait_secs,
                    attempt = attempt + 1,
                    "provider throttled, backing off"
                );
                sleep(Duration::from_secs(wait_secs)).await;
                gate.stamp().await;
            }
        }
    }

    FetchOutcome::ThrottleExhausted {
        attempts: max_retries,
        last_wait_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a fixed sequence of responses, then keeps reporting throttling.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<Ohlcv>>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Ohlcv>>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl QuoteSource for ScriptedSource {
        async fn history(&self, _symbol: &str, _start: &str, _end: &str) -> Result<Vec<Ohlcv>> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(AppError::Network("too many requests".to_string()))
            } else {
                responses.remove(0)
            }
        }
    }

    fn bars(count: usize) -> Vec<Ohlcv> {
        (0..count)
            .map(|i| Ohlcv {
                time: DateTime::<Utc>::from_timestamp(1_704_067_200 + i as i64 * 86_400, 0)
                    .unwrap(),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 1_000,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_once_then_succeeds_after_the_stated_wait() {
        let source = ScriptedSource::new(vec![
            Err(AppError::Network("Vui lòng thử lại sau 10 giây".to_string())),
            Ok(bars(100)),
        ]);
        let gate = RateGate::from_secs(0.0);
        let started = Instant::now();

        let outcome = fetch_with_retry(&source, &gate, "ABC", "2024-01-01", "2024-06-01", 5).await;

        match outcome {
            FetchOutcome::Fetched(rows) => assert_eq!(rows.len(), 100),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(source.calls(), 2);
        // One wait of 10s hint + 5s buffer, nothing else.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn non_throttling_error_is_terminal_after_one_attempt() {
        let source =
            ScriptedSource::new(vec![Err(AppError::Network("invalid symbol".to_string()))]);
        let gate = RateGate::from_secs(0.0);
        let started = Instant::now();

        let outcome = fetch_with_retry(&source, &gate, "ABC", "2024-01-01", "2024-06-01", 5).await;

        match outcome {
            FetchOutcome::Failed(message) => assert!(message.contains("invalid symbol")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(source.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_throttle_exhausts_the_attempt_budget() {
        let source = ScriptedSource::new(Vec::new());
        let gate = RateGate::from_secs(0.0);
        let started = Instant::now();

        let outcome = fetch_with_retry(&source, &gate, "ABC", "2024-01-01", "2024-06-01", 5).await;

        match outcome {
            FetchOutcome::ThrottleExhausted {
                attempts,
                last_wait_secs,
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(last_wait_secs, 240);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(source.calls(), 5);
        // Four waits happened (15 + 30 + 60 + 120); the fifth attempt fails
        // without another sleep.
        assert_eq!(started.elapsed(), Duration::from_secs(225));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_history_is_terminal_no_data() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let gate = RateGate::from_secs(0.0);

        let outcome = fetch_with_retry(&source, &gate, "ABC", "2024-01-01", "2024-06-01", 5).await;

        assert!(matches!(outcome, FetchOutcome::NoData));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_respect_the_gate_spacing() {
        let source = ScriptedSource::new(Vec::new());
        let gate = RateGate::from_secs(2.0);
        let started = Instant::now();

        let _ = fetch_with_retry(&source, &gate, "ABC", "2024-01-01", "2024-06-01", 2).await;

        assert_eq!(source.calls(), 2);
        // First acquire is free, then one 15s backoff; the re-stamp after the
        // wait forces a further 2s gate delay before the second attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(17));
    }
}
