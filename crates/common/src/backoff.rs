use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter and an optional cap on the total wait.
///
/// Formula: min(max_delay, base * 2^attempt) + random_jitter
///
/// When a total budget is set, [`try_next_delay`](Self::try_next_delay) stops
/// handing out delays once the sum of returned delays reaches the budget.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    attempt: u32,
    max_total: Option<Duration>,
    waited: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.1,
            attempt: 0,
            max_total: None,
            waited: Duration::ZERO,
        }
    }
}

impl ExponentialBackoff {
    /// Create a new ExponentialBackoff.
    ///
    /// # Arguments
    /// * `base` - Initial delay duration
    /// * `max_delay` - Maximum delay cap
    /// * `jitter_factor` - Jitter as a fraction of delay (0.0 to 1.0). Negative values are clamped to 0.
    pub fn new(base: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base,
            max_delay,
            // Clamp negative jitter to 0 to prevent gen_range panic
            jitter_factor: jitter_factor.max(0.0),
            attempt: 0,
            max_total: None,
            waited: Duration::ZERO,
        }
    }

    /// Limit the sum of all delays handed out by `try_next_delay`.
    pub fn with_max_total(mut self, max_total: Duration) -> Self {
        self.max_total = Some(max_total);
        self
    }

    /// Calculate the next delay and increment the attempt counter.
    ///
    /// Ignores the total budget.
    pub fn next_delay(&mut self) -> Duration {
        let exp_delay = self.base.saturating_mul(2u32.saturating_pow(self.attempt));
        let capped_delay = exp_delay.min(self.max_delay);

        // Add jitter: random value in [-jitter_factor, +jitter_factor] of the delay
        let jitter_range = capped_delay.as_secs_f64() * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_secs = (capped_delay.as_secs_f64() + jitter).max(0.0);

        self.attempt = self.attempt.saturating_add(1);

        let delay = Duration::from_secs_f64(final_secs);
        self.waited = self.waited.saturating_add(delay);
        delay
    }

    /// Next delay, or `None` once the total budget is spent.
    ///
    /// The last delay is trimmed so the total never exceeds the budget.
    pub fn try_next_delay(&mut self) -> Option<Duration> {
        let Some(max_total) = self.max_total else {
            return Some(self.next_delay());
        };

        let remaining = max_total.saturating_sub(self.waited);
        if remaining.is_zero() {
            return None;
        }

        let delay = self.next_delay().min(remaining);
        self.waited = self.waited.min(max_total);
        Some(delay)
    }

    /// Reset the attempt counter and the spent budget (call after a success).
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.waited = Duration::ZERO;
    }

    /// Get current attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Sum of all delays handed out since the last reset.
    pub fn total_waited(&self) -> Duration {
        self.waited
    }
}
