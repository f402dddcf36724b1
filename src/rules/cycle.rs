//! ON/OFF duty-cycle state machine.
//!
//! ```text
//!          off_duration elapsed
//!   ┌─────┐ ───────────────────▶ ┌────┐
//!   │ OFF │                      │ ON │
//!   └─────┘ ◀─────────────────── └────┘
//!    start    on_duration elapsed
//! ```
//!
//! Pure time arithmetic: the caller feeds elapsed time, the machine reports
//! whether it crossed a boundary.  No clock, no I/O.

use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    On,
    Off,
}

impl CyclePhase {
    fn flipped(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleState {
    phase: CyclePhase,
    on: Duration,
    off: Duration,
    in_phase: Duration,
    /// Durations staged by [`reconfigure`](Self::reconfigure).
    pending: Option<(Duration, Duration)>,
    total_on: Duration,
    total_off: Duration,
    completed_on: u64,
}

fn check(on: Duration, off: Duration) -> Result<(), ConfigError> {
    if on.is_zero() || off.is_zero() {
        return Err(ConfigError::Validation(
            "cycle durations must be > 0".to_string(),
        ));
    }
    Ok(())
}

impl CycleState {
    /// A new cycle, starting at the beginning of OFF.
    pub fn new(on: Duration, off: Duration) -> Result<Self, ConfigError> {
        check(on, off)?;
        Ok(Self {
            phase: CyclePhase::Off,
            on,
            off,
            in_phase: Duration::ZERO,
            pending: None,
            total_on: Duration::ZERO,
            total_off: Duration::ZERO,
            completed_on: 0,
        })
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn durations(&self) -> (Duration, Duration) {
        (self.on, self.off)
    }

    /// Cumulative time spent ON.
    pub fn total_on(&self) -> Duration {
        self.total_on
    }

    pub fn total_off(&self) -> Duration {
        self.total_off
    }

    /// ON intervals that have run to completion.
    pub fn completed_on(&self) -> u64 {
        self.completed_on
    }

    /// Fraction of elapsed time spent ON.
    pub fn duty(&self) -> f64 {
        let total = (self.total_on + self.total_off).as_secs_f64();
        if total == 0.0 {
            0.0
        } else {
            self.total_on.as_secs_f64() / total
        }
    }

    /// Stage new durations.  Takes effect at the next boundary; the phase
    /// in progress keeps its original length.
    pub fn reconfigure(&mut self, on: Duration, off: Duration) -> Result<(), ConfigError> {
        check(on, off)?;
        self.pending = Some((on, off));
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn current_len(&self) -> Duration {
        match self.phase {
            CyclePhase::On => self.on,
            CyclePhase::Off => self.off,
        }
    }

    fn accumulate(&mut self, dt: Duration) {
        self.in_phase += dt;
        match self.phase {
            CyclePhase::On => self.total_on += dt,
            CyclePhase::Off => self.total_off += dt,
        }
    }

    /// Advance by `dt`.  Returns the phase after the last boundary crossed,
    /// or `None` if no boundary was reached.  A span covering several
    /// boundaries flips through all of them.
    pub fn advance(&mut self, dt: Duration) -> Option<CyclePhase> {
        let mut remaining = dt;
        let mut crossed = false;
        loop {
            let left = self.current_len().saturating_sub(self.in_phase);
            if remaining < left {
                self.accumulate(remaining);
                break;
            }
            self.accumulate(left);
            remaining -= left;
            if self.phase == CyclePhase::On {
                self.completed_on += 1;
            }
            self.phase = self.phase.flipped();
            self.in_phase = Duration::ZERO;
            if let Some((on, off)) = self.pending.take() {
                self.on = on;
                self.off = off;
            }
            crossed = true;
        }
        crossed.then_some(self.phase)
    }
}
