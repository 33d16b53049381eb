//! Exponential backoff with jitter, used between retries of beacon node requests.

use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP 429 Too Many Requests.
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// HTTP 503 Service Unavailable.
const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Returns true if the HTTP status code indicates a retryable error.
///
/// Only 429 (Too Many Requests) and 503 (Service Unavailable) are retryable;
/// every other status fails fast.
pub fn should_retry(status: u16) -> bool {
    status == STATUS_TOO_MANY_REQUESTS || status == STATUS_SERVICE_UNAVAILABLE
}

#[derive(Debug, Clone)]
pub struct Config {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// 0.2 means +/- 20%.
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// A stateful exponential backoff generator.
///
/// The first delay is always exactly `initial_delay`; subsequent delays grow by
/// `multiplier` with a uniformly random jitter applied, clamped to `max_delay`.
#[derive(Debug)]
pub struct Backoff {
    config: Config,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Rewinds the generator to attempt 0.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Returns the next delay and advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        if self.attempts == 0 {
            self.attempts += 1;
            return self.config.initial_delay;
        }

        let exponential = self.config.initial_delay.as_secs_f64()
            * self.config.multiplier.powi(self.attempts as i32);

        let jitter =
            1.0 + rand::thread_rng().gen_range(-1.0..=1.0) * self.config.jitter_factor;
        let delay = Duration::from_secs_f64(exponential * jitter);

        self.attempts += 1;
        delay.min(self.config.max_delay)
    }

    /// Sleeps for the next backoff delay.
    ///
    /// Returns `true` if the wait completed, `false` if the token was cancelled
    /// before the delay elapsed.
    pub async fn wait(&mut self, shutdown: &CancellationToken) -> bool {
        let delay = self.next_delay();
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_deterministic() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn delays_grow_within_jitter_bounds() {
        let mut backoff = Backoff::default();
        backoff.next_delay();

        // Attempt 1: 200ms nominal, +/- 20%.
        let second = backoff.next_delay();
        assert!(second >= Duration::from_millis(160), "{:?}", second);
        assert!(second <= Duration::from_millis(240), "{:?}", second);

        // Attempt 2: 400ms nominal, +/- 20%.
        let third = backoff.next_delay();
        assert!(third >= Duration::from_millis(320), "{:?}", third);
        assert!(third <= Duration::from_millis(480), "{:?}", third);
    }

    #[test]
    fn delay_is_clamped_to_max() {
        let mut backoff = Backoff::new(Config {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            multiplier: 10.0,
            jitter_factor: 0.0,
        });
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn reset_rewinds_to_first_attempt() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn retryable_statuses_are_exact() {
        assert!(should_retry(429));
        assert!(should_retry(503));

        assert!(!should_retry(200));
        assert!(!should_retry(404));
        assert!(!should_retry(500));
        assert!(!should_retry(502));
        assert!(!should_retry(504));
    }

    #[tokio::test]
    async fn wait_completes_when_not_cancelled() {
        let mut backoff = Backoff::default();
        let token = CancellationToken::new();
        assert!(backoff.wait(&token).await);
    }

    #[tokio::test]
    async fn wait_returns_early_on_cancellation() {
        let mut backoff = Backoff::new(Config {
            initial_delay: Duration::from_secs(60),
            ..Config::default()
        });
        let token = CancellationToken::new();
        token.cancel();

        let start = std::time::Instant::now();
        assert!(!backoff.wait(&token).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
