//! Reconnect delay policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard ceiling on the exponent so the shift can't overflow.
const MAX_EXPONENT: u32 = 10;

/// How the delay between reconnect attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    /// Same delay before every attempt.
    #[default]
    Fixed,
    /// Doubling delay with jitter, capped at `max_delay_ms`.
    Exponential,
}

/// Reconnect policy. Retries are unbounded in every mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub mode: ReconnectMode,
    /// Fixed delay, or the base delay for exponential mode.
    pub delay_ms: u64,
    /// Upper bound for exponential mode.
    pub max_delay_ms: u64,
    /// Add up to 20% random jitter in exponential mode.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            mode: ReconnectMode::Fixed,
            delay_ms: 2_000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-delay policy. Delays beyond `u64::MAX` milliseconds saturate.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            mode: ReconnectMode::Fixed,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt number `attempt` (0-based since the last
    /// successful open).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.mode {
            ReconnectMode::Fixed => Duration::from_millis(self.delay_ms),
            ReconnectMode::Exponential => {
                let delay = self
                    .delay_ms
                    .saturating_mul(1u64 << attempt.min(MAX_EXPONENT));
                let jitter = if self.jitter {
                    (delay as f64 * 0.2 * rand::random::<f64>()) as u64
                } else {
                    0
                };
                Duration::from_millis(delay.saturating_add(jitter).min(self.max_delay_ms))
            }
        }
    }
}
