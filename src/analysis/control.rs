//! Cooperative cancellation and progress reporting.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress callbacks fire roughly this many times over a run.
pub const PROGRESS_UPDATES: usize = 50;

/// Shared flag for stopping a running analysis.
///
/// Clones share the flag; the analysis checks it between timesteps or sweep
/// points and returns the partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Snapshot passed to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Points or steps completed
    pub completed: usize,
    /// Points or steps in the whole run
    pub total: usize,
    /// Time or swept value of the latest point
    pub x: f64,
}

impl Progress {
    /// Completed share of the run in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Caller-side controls for one analysis run.
#[derive(Default)]
pub struct RunControl<'a> {
    pub cancel: Option<CancelToken>,
    pub progress: Option<&'a mut dyn FnMut(Progress)>,
}

impl<'a> RunControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, callback: &'a mut dyn FnMut(Progress)) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Report progress if `completed` falls on the coarse reporting grid.
    pub(crate) fn report(&mut self, completed: usize, total: usize, x: f64) {
        let Some(callback) = self.progress.as_deref_mut() else {
            return;
        };
        let stride = (total / PROGRESS_UPDATES).max(1);
        if completed % stride == 0 || completed == total {
            callback(Progress { completed, total, x });
        }
    }
}

impl fmt::Debug for RunControl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunControl")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let control = RunControl::new().with_cancel(token.clone());
        assert!(!control.is_cancelled());
        token.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_progress_cadence() {
        let mut calls = Vec::new();
        let mut record = |p: Progress| calls.push(p.completed);
        {
            let mut control = RunControl::new().with_progress(&mut record);
            for k in 1..=1000 {
                control.report(k, 1000, k as f64);
            }
        }
        assert_eq!(calls.len(), 50);
        assert_eq!(calls.last(), Some(&1000));
    }

    #[test]
    fn test_short_run_reports_every_point() {
        let mut count = 0;
        let mut record = |_: Progress| count += 1;
        {
            let mut control = RunControl::new().with_progress(&mut record);
            for k in 1..=3 {
                control.report(k, 3, 0.0);
            }
        }
        assert_eq!(count, 3);
    }
}
