//! Run configuration: domain size, step budget, diffusion coefficient and the
//! scheduling knobs of the step loop.
//!
//! A [`DiffusionConfig`] is built once, validated once, and read-only for the
//! rest of the run.

use serde::{Deserialize, Serialize};

use crate::diffusion_error::DiffusionError;

/// Default global domain size.
pub const DEFAULT_GLOBAL_SIZE: usize = 100_000;
/// Default number of time steps.
pub const DEFAULT_STEPS: u64 = 5_000;
/// Diffusion coefficient; stability requires `alpha < 0.5`.
pub const DEFAULT_ALPHA: f64 = 0.1;
/// Value written into rank 0's hot region at start-up.
pub const DEFAULT_HOT_VALUE: f64 = 10.0;

/// How halo exchange and computation are ordered within a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangeStrategy {
    /// Blocking send/receive, then the whole owned range.
    Blocking,
    /// Non-blocking exchange, wait for all four requests, then the whole owned range.
    NonBlockingWait,
    /// Interior computed while the exchange is in flight, boundary cells after.
    #[default]
    Overlap,
}

impl ExchangeStrategy {
    pub const ALL: [ExchangeStrategy; 3] = [
        ExchangeStrategy::Blocking,
        ExchangeStrategy::NonBlockingWait,
        ExchangeStrategy::Overlap,
    ];
}

/// How the overlap strategy waits for its two receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollStrategy {
    /// Tight non-blocking loop; no yield, no sleep.
    #[default]
    Spin,
    /// Poll, then yield the thread between rounds.
    Yield,
    /// Blocking wait on each receive.
    Block,
}

/// What to do when the global size is not a multiple of the rank count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemainderPolicy {
    /// Drop the trailing `global_size % nranks` cells and log a warning.
    #[default]
    Warn,
    /// Refuse to start.
    Reject,
}

/// Everything the step loop needs, passed at construction.
///
/// Validity: `global_size > 0`, `steps > 0`, `0 <= alpha < 0.5`.
/// Rank-count dependent checks happen in [`Partition::new`](crate::partition::Partition::new).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub global_size: usize,
    pub steps: u64,
    pub alpha: f64,
    pub strategy: ExchangeStrategy,
    pub poll: PollStrategy,
    /// Cap on receive-poll rounds per step; `None` spins forever.
    pub poll_limit: Option<u64>,
    pub remainder: RemainderPolicy,
    pub hot_value: f64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            global_size: DEFAULT_GLOBAL_SIZE,
            steps: DEFAULT_STEPS,
            alpha: DEFAULT_ALPHA,
            strategy: ExchangeStrategy::default(),
            poll: PollStrategy::default(),
            poll_limit: None,
            remainder: RemainderPolicy::default(),
            hot_value: DEFAULT_HOT_VALUE,
        }
    }
}

impl DiffusionConfig {
    pub fn new(global_size: usize, steps: u64, alpha: f64) -> Self {
        Self {
            global_size,
            steps,
            alpha,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: ExchangeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_poll(mut self, poll: PollStrategy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_poll_limit(mut self, limit: u64) -> Self {
        self.poll_limit = Some(limit);
        self
    }

    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    pub fn with_hot_value(mut self, hot_value: f64) -> Self {
        self.hot_value = hot_value;
        self
    }

    /// Check the rank-independent constraints.
    pub fn validate(&self) -> Result<(), DiffusionError> {
        if self.global_size == 0 {
            return Err(DiffusionError::InvalidGlobalSize);
        }
        if self.steps == 0 {
            return Err(DiffusionError::ZeroSteps);
        }
        if !self.alpha.is_finite() || !(0.0..0.5).contains(&self.alpha) {
            return Err(DiffusionError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_benchmark() {
        let cfg = DiffusionConfig::default();
        assert_eq!(cfg.global_size, 100_000);
        assert_eq!(cfg.steps, 5_000);
        assert_eq!(cfg.alpha, 0.1);
        assert_eq!(cfg.strategy, ExchangeStrategy::Overlap);
        assert_eq!(cfg.poll, PollStrategy::Spin);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn alpha_bounds() {
        assert!(DiffusionConfig::new(10, 1, 0.0).validate().is_ok());
        assert!(DiffusionConfig::new(10, 1, 0.499).validate().is_ok());
        assert_eq!(
            DiffusionConfig::new(10, 1, 0.5).validate(),
            Err(DiffusionError::InvalidAlpha(0.5))
        );
        assert!(DiffusionConfig::new(10, 1, -0.1).validate().is_err());
        assert!(DiffusionConfig::new(10, 1, f64::NAN).validate().is_err());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert_eq!(
            DiffusionConfig::new(0, 1, 0.1).validate(),
            Err(DiffusionError::InvalidGlobalSize)
        );
        assert_eq!(
            DiffusionConfig::new(10, 0, 0.1).validate(),
            Err(DiffusionError::ZeroSteps)
        );
    }
}
