//! Retry policy for transient gateway failures.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff with symmetric jitter (Value Object)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    /// Fraction of the delay added or removed at random (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `jitter_sample` is a value in `-1.0..=1.0`, supplied by the caller so
    /// this stays deterministic; it is clamped if out of range.
    pub fn delay_for(&self, retry: u32, jitter_sample: f64) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let nominal = self.base_delay_ms as f64 * self.factor.powi(exponent);
        let spread = 1.0 + self.jitter * jitter_sample.clamp(-1.0, 1.0);
        Duration::from_millis((nominal * spread).max(0.0).round() as u64)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.factor < 1.0 {
            return Err(DomainError::Configuration(format!(
                "retry factor must be >= 1 (got {})",
                self.factor
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(DomainError::Configuration(format!(
                "retry jitter must be within 0..1 (got {})",
                self.jitter
            )));
        }
        Ok(())
    }
}
