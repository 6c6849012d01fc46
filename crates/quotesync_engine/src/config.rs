//! Configuration for the sync engine.

use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

/// Configuration for one editing session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Session ID (unique per tab/device session).
    pub session_id: Uuid,
    /// Autosave debounce delay.
    pub debounce: Duration,
    /// Timeout applied to every gateway call.
    pub request_timeout: Duration,
    /// Window in which a second reconnect does not trigger another catch-up.
    pub reconnect_cooldown: Duration,
    /// Maximum fast-forward rebases chained in one push cycle.
    pub max_fast_forwards: u32,
    /// Retry configuration for transport failures.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration for interactive edits (5 s debounce).
    pub fn interactive() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            debounce: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(10),
            reconnect_cooldown: Duration::from_secs(2),
            max_fast_forwards: 3,
            retry: RetryConfig::default(),
        }
    }

    /// Creates a configuration for a single in-dialog edit session (800 ms debounce).
    pub fn dialog() -> Self {
        Self::interactive().with_debounce(Duration::from_millis(800))
    }

    /// Sets the session ID.
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    /// Sets the debounce delay.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the reconnect cooldown.
    pub fn with_reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = cooldown;
        self
    }

    /// Sets the maximum chained fast-forwards per push cycle.
    pub fn with_max_fast_forwards(mut self, max: u32) -> Self {
        self.max_fast_forwards = max;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: false,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let interactive = SyncConfig::interactive();
        assert_eq!(interactive.debounce, Duration::from_millis(5000));
        assert_eq!(interactive.request_timeout, Duration::from_secs(10));
        assert_eq!(interactive.reconnect_cooldown, Duration::from_secs(2));

        let dialog = SyncConfig::dialog();
        assert_eq!(dialog.debounce, Duration::from_millis(800));
        assert_ne!(dialog.session_id, interactive.session_id);
    }

    #[test]
    fn sync_config_builder() {
        let session = Uuid::new_v4();
        let config = SyncConfig::interactive()
            .with_session_id(session)
            .with_debounce(Duration::from_millis(250))
            .with_request_timeout(Duration::from_secs(3))
            .with_max_fast_forwards(1)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.session_id, session);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.max_fast_forwards, 1);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn default_retry_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn retry_delay_with_jitter() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_jitter(true);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }
}
