//! Retry policy and per-call retry state.
//!
//! Exponential backoff: the n-th retry waits `base * 2^(n-1)`, capped at
//! `max`.  With jitter enabled the delay is scaled by a uniform factor in
//! `[0.5, 1.0]` so a fleet of agents does not hammer a recovering backend
//! in lockstep.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Budget for one call including every retry and backoff.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_retries: c.max_retries,
            base_delay: Duration::from_millis(c.base_delay_ms),
            max_delay: Duration::from_millis(c.max_delay_ms),
            jitter: c.jitter,
            deadline: Duration::from_millis(c.deadline_ms),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Retry bookkeeping for one call.  Dropped when the call resolves.
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    retries: u32,
}

impl<'a> RetryState<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Retries consumed so far.  Never exceeds `policy.max_retries`.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Attempts made so far, counting the first one.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Consume one retry and return the delay to wait before it, or `None`
    /// once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;
        let delay = self.policy.backoff(self.retries);
        if self.policy.jitter {
            let scale = rand::thread_rng().gen_range(0.5..=1.0);
            Some(delay.mul_f64(scale))
        } else {
            Some(delay)
        }
    }
}
