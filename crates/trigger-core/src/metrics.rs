//! Atomic counters for dispatch observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a trigger run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the pipeline maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// A project's current snapshot was replaced by an older one.
    SnapshotDowngrade,
    BuildDispatched,
    DispatchFailure,
    /// A stale mirror was resynced to find a revision.
    VcsResync,
}

impl Counter {
    pub fn name(self) -> &'static str {
        match self {
            Counter::SnapshotDowngrade => "downgrade",
            Counter::BuildDispatched => "builds_dispatched",
            Counter::DispatchFailure => "dispatch_failures",
            Counter::VcsResync => "vcs_resyncs",
        }
    }
}

/// Atomic counters shared across a trigger run.
#[derive(Debug, Default)]
pub struct Metrics {
    snapshot_downgrades: AtomicU64,
    builds_dispatched: AtomicU64,
    dispatch_failures: AtomicU64,
    vcs_resyncs: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            snapshot_downgrades: AtomicU64::new(0),
            builds_dispatched: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            vcs_resyncs: AtomicU64::new(0),
        }
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::SnapshotDowngrade => &self.snapshot_downgrades,
            Counter::BuildDispatched => &self.builds_dispatched,
            Counter::DispatchFailure => &self.dispatch_failures,
            Counter::VcsResync => &self.vcs_resyncs,
        }
    }

    /// Increment `counter` by one.
    pub fn increment(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = counter.name(), "counter incremented");
    }

    /// Read the current value of `counter`.
    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            downgrade = self.get(Counter::SnapshotDowngrade),
            builds_dispatched = self.get(Counter::BuildDispatched),
            dispatch_failures = self.get(Counter::DispatchFailure),
            vcs_resyncs = self.get(Counter::VcsResync),
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            Counter::SnapshotDowngrade,
            Counter::BuildDispatched,
            Counter::DispatchFailure,
            Counter::VcsResync,
        ] {
            self.slot(counter).store(0, Ordering::Relaxed);
        }
    }
}
