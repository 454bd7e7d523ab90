//! Caller-side retry policy and backoff calculations

use kiln_config::NetworkConfig;
use std::time::Duration;

/// Retry configuration for source fetches
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl From<&NetworkConfig> for RetryConfig {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            max_retries: config.retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            ..Self::default()
        }
    }
}

/// Calculate exponential backoff delay with jitter for retry `attempt` (1-based)
#[must_use]
pub fn calculate_backoff_delay(retry_config: &RetryConfig, attempt: u32) -> Duration {
    // Precision loss acceptable for backoff calculations
    #[allow(clippy::cast_precision_loss)]
    let base_delay = retry_config
        .initial_delay
        .as_millis()
        .min(u128::from(u64::MAX)) as f64;
    #[allow(clippy::cast_precision_loss)]
    let max_delay = retry_config.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

    // Retry attempts are small, so this cast is safe
    #[allow(clippy::cast_possible_wrap)]
    let exponent = attempt.saturating_sub(1).min(64) as i32;
    let delay = (base_delay * retry_config.backoff_multiplier.powi(exponent)).min(max_delay);

    // Add jitter
    let jitter = delay * retry_config.jitter_factor * (rand::random::<f64>() - 0.5);

    // Safe cast: max(0.0) ensures non-negative, round() handles fractional part
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let final_delay = (delay + jitter).max(0.0).round() as u64;

    Duration::from_millis(final_delay)
}
