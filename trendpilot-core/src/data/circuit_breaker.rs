//! Circuit breaker shared by the HTTP providers.
//!
//! Repeated failures (or an outright ban response) open the breaker, which
//! then refuses requests until the cooldown elapses. For a once-daily batch
//! job an open breaker usually means the remaining tickers of this run are
//! skipped and picked up again tomorrow.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Failure-threshold breaker with a fixed cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                open_until: None,
            }),
            cooldown,
            failure_threshold,
        }
    }

    /// Defaults tuned for daily-batch providers: 15-minute cooldown, three
    /// consecutive failures to open.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(15 * 60), 3)
    }

    /// Whether a request may be issued right now. An expired cooldown closes
    /// the breaker again as a side effect.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.open_until {
            None => true,
            Some(until) if Instant::now() >= until => {
                inner.open_until = None;
                inner.consecutive_failures = 0;
                true
            }
            Some(_) => false,
        }
    }

    /// A successful request resets the failure streak.
    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// A failed request; opens the breaker once the streak reaches the
    /// threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.open_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Open immediately (e.g. HTTP 403 — the vendor has banned us).
    pub fn trip(&self) {
        self.inner.lock().unwrap().open_until = Some(Instant::now() + self.cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        assert!(CircuitBreaker::default_provider().is_allowed());
    }

    #[test]
    fn opens_at_threshold() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn success_resets_streak() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 2);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn trip_opens_immediately() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 5);
        cb.trip();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn cooldown_expiry_closes() {
        let cb = CircuitBreaker::new(Duration::from_millis(5), 1);
        cb.record_failure();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(10));
        assert!(cb.is_allowed());
    }
}
