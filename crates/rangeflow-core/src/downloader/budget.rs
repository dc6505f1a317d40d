//! Per-download worker budget.
//!
//! Tracks how many more workers a download may start (ramp-up), how many are
//! running, and whether an overload signal has frozen ramp-up for good.

/// Ramp-up allowance and live worker count of one download.
#[derive(Debug, Clone)]
pub(crate) struct WorkerBudget {
    remaining: usize,
    live: usize,
    peak: usize,
    degraded: bool,
}

impl WorkerBudget {
    /// Budget allowing up to `concurrency` workers in total.
    pub(crate) fn new(concurrency: usize) -> Self {
        Self {
            remaining: concurrency,
            live: 0,
            peak: 0,
            degraded: false,
        }
    }

    /// Whether ramp-up may start another worker.
    pub(crate) fn can_spawn(&self) -> bool {
        !self.degraded && self.remaining > 0
    }

    /// Record a started worker.
    pub(crate) fn spawn(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        self.live += 1;
        self.peak = self.peak.max(self.live);
    }

    /// Stop ramping without marking the download degraded (limiter exhausted).
    pub(crate) fn stop_ramp(&mut self) {
        self.remaining = 0;
    }

    /// Register a failure on a chunk other than the first. Freezes ramp-up and
    /// returns true when the failing worker should retire: it carried a
    /// ramp-up chunk or ramp-up was still in progress, and another worker is
    /// left to pick up the requeued chunk.
    ///
    /// A retiring worker stops counting as live right away, so concurrent
    /// failures can never retire the last one.
    pub(crate) fn overload(&mut self, triggers_next_worker: bool) -> bool {
        let was_ramping = self.can_spawn();
        self.degraded = true;
        let retire = (triggers_next_worker || was_ramping) && self.live > 1;
        if retire {
            self.live -= 1;
        }
        retire
    }

    /// Record an exited worker that was not already retired by `overload`.
    pub(crate) fn retire(&mut self) {
        self.live = self.live.saturating_sub(1);
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.degraded
    }
}
