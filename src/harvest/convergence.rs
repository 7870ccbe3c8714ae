//! Convergence Monitor: decides CONTINUE / STOP once per loop iteration.
//!
//! Rules, in order:
//! 1. known target and ledger ≥ target → converged
//! 2. wall clock past its ceiling → exhausted
//! 3. attempts at their ceiling → exhausted
//! 4. no target, rows collected, and nothing on the page scrolls at all → converged
//! 5. at the scroll ceiling with `stop_threshold` non-growing rounds → stalled
//!    (the loop re-checks the target and scroll capacity before stopping)
//! 6. otherwise continue

use crate::core::config::HarvestSettings;
use crate::core::types::{AdvanceReport, ConvergeReason, ExhaustReason, TargetCount};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stalled,
    Converged(ConvergeReason),
    Exhausted(ExhaustReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub attempt_ceiling: u64,
    pub wall_clock_ceiling: Duration,
    pub stop_threshold: u32,
    pub escalate_threshold: u32,
}

impl From<&HarvestSettings> for Limits {
    fn from(s: &HarvestSettings) -> Self {
        Self {
            attempt_ceiling: s.attempt_ceiling,
            wall_clock_ceiling: s.wall_clock_ceiling,
            stop_threshold: s.no_progress_stop_threshold,
            escalate_threshold: s.escalate_threshold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub attempts: u64,
    pub no_progress: u32,
    pub last_total: usize,
    pub target: Option<TargetCount>,
}

#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    limits: Limits,
    started: Instant,
    progress: ProgressState,
}

impl ConvergenceMonitor {
    /// `started` is shared across phases so the wall-clock ceiling covers the whole run.
    pub fn new(limits: Limits, started: Instant) -> Self {
        Self {
            limits,
            started,
            progress: ProgressState::default(),
        }
    }

    /// Continue counting from attempts already spent earlier in the run, so
    /// the attempt ceiling stays global across pagination phases.
    pub fn with_prior_attempts(mut self, attempts: u64) -> Self {
        self.progress.attempts = attempts;
        self
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.progress.attempts >= self.limits.attempt_ceiling
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn begin_attempt(&mut self) {
        self.progress.attempts += 1;
    }

    /// Feed the result of one `Ledger::merge`.
    pub fn record_merge(&mut self, inserted: usize, ledger_len: usize) {
        if inserted > 0 {
            self.progress.no_progress = 0;
        } else {
            self.progress.no_progress += 1;
        }
        self.progress.last_total = ledger_len;
    }

    /// Latest advertised count wins; `None` keeps what we had.
    pub fn observe_target(&mut self, target: Option<TargetCount>) {
        if target.is_some() {
            self.progress.target = target;
        }
    }

    pub fn target_reached(&self, ledger_len: usize) -> bool {
        matches!(self.progress.target, Some(t) if ledger_len as u64 >= t.total)
    }

    pub fn should_escalate(&self) -> bool {
        self.progress.no_progress >= self.limits.escalate_threshold
    }

    /// Forget the stagnation streak after a re-check found more room to scroll.
    pub fn resume_after_stall(&mut self) {
        self.progress.no_progress = 0;
    }

    pub fn evaluate(&self, ledger_len: usize, last_advance: &AdvanceReport) -> Verdict {
        if self.target_reached(ledger_len) {
            return Verdict::Converged(ConvergeReason::TargetReached);
        }
        if self.elapsed() > self.limits.wall_clock_ceiling {
            return Verdict::Exhausted(ExhaustReason::WallClock);
        }
        if self.attempts_exhausted() {
            return Verdict::Exhausted(ExhaustReason::Attempts);
        }
        if self.progress.target.is_none() && ledger_len > 0 && !last_advance.scrollable {
            return Verdict::Converged(ConvergeReason::FullyRendered);
        }
        if last_advance.at_ceiling && self.progress.no_progress >= self.limits.stop_threshold {
            return Verdict::Stalled;
        }
        Verdict::Continue
    }
}
