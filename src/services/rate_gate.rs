use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Enforces a minimum spacing between consecutive outbound requests across
/// every worker sharing the gate.
///
/// The mutex is held for the whole check-elapsed / sleep / stamp-now
/// sequence, so two callers can never both observe the gate as free and fire
/// near-simultaneous requests. Scoped to one batch run and passed by
/// reference to every worker.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// Block until `min_interval` has elapsed since the last granted
    /// acquisition, then record the new timestamp and return.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Reset the last-request timestamp to now. Called after a backoff wait
    /// so the next acquisition is measured from the wake-up, not from the
    /// request that got throttled.
    pub async fn stamp(&self) {
        *self.last_request.lock().await = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquisitions_are_spaced() {
        let gate = Arc::new(RateGate::from_secs(2.0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
                Instant::now()
            }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquisition_is_immediate() {
        let gate = RateGate::from_secs(2.0);
        let before = Instant::now();
        gate.acquire().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn stamp_pushes_the_next_acquisition_out() {
        let gate = RateGate::from_secs(2.0);
        gate.acquire().await;

        tokio::time::advance(Duration::from_secs(2)).await;
        gate.stamp().await;

        let before = Instant::now();
        gate.acquire().await;
        assert!(Instant::now() - before >= Duration::from_secs(2));
    }
}
