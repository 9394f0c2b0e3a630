// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Decision delivery retry policy with exponential backoff.
//!
//! # Environment Variables
//!
//! - `RATIFY_RETRY_MAX_ATTEMPTS`: Attempts per participant, including the first (default: 3)
//! - `RATIFY_RETRY_INITIAL_BACKOFF_MS`: Initial backoff in milliseconds (default: 100)
//! - `RATIFY_RETRY_MAX_BACKOFF_MS`: Maximum backoff in milliseconds (default: 2000)
//! - `RATIFY_RETRY_MULTIPLIER`: Backoff multiplier (default: 2.0)

use std::time::Duration;

/// Default attempts per participant, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default initial backoff duration in milliseconds
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Default maximum backoff duration in milliseconds
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2_000;

/// Default backoff multiplier for exponential growth
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per participant. 1 disables retry.
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier for exponential backoff (typically 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Create configuration from environment variables. Unparseable
    /// values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RATIFY_RETRY_MAX_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                config.max_attempts = v;
            }
        }

        if let Ok(val) = std::env::var("RATIFY_RETRY_INITIAL_BACKOFF_MS") {
            if let Ok(v) = val.parse() {
                config.initial_backoff_ms = v;
            }
        }

        if let Ok(val) = std::env::var("RATIFY_RETRY_MAX_BACKOFF_MS") {
            if let Ok(v) = val.parse() {
                config.max_backoff_ms = v;
            }
        }

        if let Ok(val) = std::env::var("RATIFY_RETRY_MULTIPLIER") {
            if let Ok(v) = val.parse() {
                config.backoff_multiplier = v;
            }
        }

        config
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    pub fn with_max_backoff_ms(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.initial_backoff_ms == 0 {
            return Err("initial_backoff_ms must be greater than 0".into());
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err("max_backoff_ms must be >= initial_backoff_ms".into());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be >= 1.0".into());
        }
        Ok(())
    }

    /// Delay before retry number `retry` (0-based):
    /// `min(initial * multiplier^retry, max)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_backoff_ms as f64;
        let factor = self.backoff_multiplier.powi(retry as i32);
        let delay_ms = (base * factor).min(self.max_backoff_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::none().validate().is_ok());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new()
            .with_initial_backoff_ms(100)
            .with_max_backoff_ms(500)
            .with_backoff_multiplier(2.0);
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(30), Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RetryPolicy::new().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::new().with_initial_backoff_ms(0).validate().is_err());
        assert!(RetryPolicy::new().with_max_backoff_ms(10).validate().is_err());
        assert!(RetryPolicy::new().with_backoff_multiplier(0.5).validate().is_err());
    }
}
