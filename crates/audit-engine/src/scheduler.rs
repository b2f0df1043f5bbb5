//! Scheduler/Executor: distributes per-system analysis over a worker pool,
//! aggregates deterministically by input order, and drives the three-stage
//! cancellation ladder.

use std::sync::atomic::{AtomicUsize, AtomicU8, Ordering};
use std::sync::Arc;

use audit_common::{AuditError, System};
use rayon::prelude::*;

use crate::engine::{self, CompiledSearch, SystemOutcome};

const RUNNING: u8 = 0;
const GRACEFUL: u8 = 1;
const URGENT: u8 = 2;
const IMMEDIATE: u8 = 3;

/// Shared cancellation state, cheap to clone and safe to check from any
/// worker thread.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicU8>);

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RUNNING)))
    }

    /// Stop submitting new units; let in-flight units finish.
    pub fn request_graceful(&self) {
        self.escalate(GRACEFUL);
    }

    /// Additionally cancel in-flight units at the next line/record boundary.
    pub fn request_urgent(&self) {
        self.escalate(URGENT);
    }

    /// Abort the scheduler outright.
    pub fn request_immediate(&self) {
        self.escalate(IMMEDIATE);
    }

    fn escalate(&self, stage: u8) {
        // Cancellation only ever moves forward along the ladder.
        let _ = self.0.fetch_max(stage, Ordering::SeqCst);
    }

    pub fn is_graceful_or_above(&self) -> bool {
        self.0.load(Ordering::SeqCst) >= GRACEFUL
    }

    /// Checked by the streamer at each line/record boundary.
    pub fn should_stop_streaming(&self) -> bool {
        self.0.load(Ordering::SeqCst) >= URGENT
    }

    pub fn is_immediate(&self) -> bool {
        self.0.load(Ordering::SeqCst) >= IMMEDIATE
    }
}

/// Receives `(systems_completed, systems_total)` ticks as work units finish.
/// Must be safe to call from any worker thread.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F: Fn(usize, usize) + Send + Sync> ProgressSink for F {
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total);
    }
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Never buffer more than this many pending units at once, relative to the
/// configured worker count.
const BACKPRESSURE_FACTOR: usize = 4;

/// Run every system's applicable searches over the worker pool, honoring
/// `worker_count` (1 disables parallelism), reporting progress, and
/// stopping according to `cancel`'s stage. Results are returned in the same
/// order as `systems`, regardless of completion order.
///
/// # Errors
/// Returns `AuditError::Interrupted` only once cancellation reaches the
/// immediate stage.
pub fn run_all(
    systems: &[System],
    searches: &[CompiledSearch],
    worker_count: usize,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<Vec<SystemOutcome>, AuditError> {
    let worker_count = worker_count.max(1);
    let total = systems.len();
    let completed = AtomicUsize::new(0);
    let mut results: Vec<SystemOutcome> = Vec::with_capacity(total);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .build()
        .map_err(|e| {
            AuditError::io(
                "scheduler thread pool",
                std::io::Error::other(e.to_string()),
            )
        })?;

    let batch_size = (BACKPRESSURE_FACTOR * worker_count).max(1);
    for chunk in systems.chunks(batch_size) {
        if cancel.is_immediate() {
            return Err(AuditError::Interrupted);
        }
        if cancel.is_graceful_or_above() {
            // Stop submitting new units; what's collected so far stands.
            break;
        }
        let chunk_results: Vec<SystemOutcome> = pool.install(|| {
            chunk
                .par_iter()
                .map(|system| {
                    let outcome = engine::analyze_system(system, searches, cancel);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.on_progress(done, total);
                    outcome
                })
                .collect()
        });
        if cancel.is_immediate() {
            return Err(AuditError::Interrupted);
        }
        results.extend(chunk_results);
    }

    Ok(results)
}
