//! Progress notification and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot passed to the progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Units of work finished so far
    pub completed: usize,
    /// Total units (time points × offsets × repetitions × folds)
    pub total: usize,
}

/// Optional side channels for a decoding call. Neither affects results.
#[derive(Clone, Copy, Default)]
pub struct Monitor<'a> {
    on_progress: Option<&'a dyn Fn(Progress)>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Monitor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` once per (time point × offset × repetition × fold).
    pub fn with_progress(mut self, callback: &'a dyn Fn(Progress)) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Abort at the next fold boundary once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub(crate) fn report(&self, completed: usize, total: usize) {
        if let Some(cb) = self.on_progress {
            cb(Progress { completed, total });
        }
    }
}

impl std::fmt::Debug for Monitor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}
