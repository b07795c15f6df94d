// Retry policy - exponential backoff with jitter for redelivered jobs

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: i64,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000, // 1 second
            max_delay_ms: 30000,    // 30 seconds
            backoff_multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

impl RetryPolicy {
    /// Delay before redelivering a job whose nth attempt just failed
    /// (attempts are 1-based, matching JetStream delivery counts).
    pub fn delay_for_attempt(&self, attempt: i64) -> Duration {
        let exponent = attempt.max(1) - 1;
        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent as i32);

        // Cap at max_delay
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        // Add jitter to prevent thundering herd
        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0, // No jitter for predictable testing
        };

        assert_eq!(policy.delay_for_attempt(1).as_millis(), 1000);
        assert_eq!(policy.delay_for_attempt(2).as_millis(), 2000);
        assert_eq!(policy.delay_for_attempt(3).as_millis(), 4000);
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };

        assert!(policy.delay_for_attempt(10).as_millis() <= 5000);
    }

    #[test]
    fn test_zeroth_attempt_clamped() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0).as_millis(), 1000);
    }
}
