//! Resource-aware job scheduling
//!
//! A fixed pool of worker threads pulls jobs from one shared FIFO queue until
//! it is exhausted. The queue is the only mutable state shared between
//! workers; results come back over an mpsc channel. The pool size is the
//! policy's worker count, so the backend's concurrency ceiling is a hard
//! invariant rather than an emergent property.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use super::executor::{self, EncodeJob, JobResult, RunContext};
use super::ladder::QualityTier;
use super::policy::SchedulingPolicy;

/// Aggregate outcome of a run, for reporting and the process exit status.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub tiers_failed: Vec<QualityTier>,
}

impl RunSummary {
    pub fn from_results(results: &[JobResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            if result.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                summary.tiers_failed.push(result.tier);
            }
        }
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Run every job to a result under the given policy.
///
/// Dispatch follows the planned ladder order; completion order under
/// parallel execution is unordered and carries no meaning. Always returns
/// one result per job: a failure never halts siblings, and jobs left in the
/// queue after cancellation report as cancelled rather than vanishing.
pub fn run(jobs: Vec<EncodeJob>, policy: &SchedulingPolicy, ctx: &RunContext) -> Vec<JobResult> {
    let job_count = jobs.len();
    if job_count == 0 {
        return Vec::new();
    }

    let workers = policy.workers.min(job_count).max(1);
    tracing::info!(jobs = job_count, workers, "dispatching encode jobs");

    let queue: Arc<Mutex<VecDeque<EncodeJob>>> = Arc::new(Mutex::new(jobs.into()));
    let (tx, rx) = mpsc::channel::<JobResult>();

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let tx = tx.clone();
        let ctx = ctx.clone();

        handles.push(thread::spawn(move || {
            loop {
                // Pop under the lock, encode outside it.
                let job = queue.lock().unwrap().pop_front();
                let Some(job) = job else { break };

                if ctx.cancel_requested() {
                    // Drain without starting anything new so every job still
                    // reports a result.
                    let _ = tx.send(JobResult::cancelled(&job));
                    continue;
                }

                tracing::debug!(worker_id, tier = %job.spec.tier, "worker picked up job");
                let result = executor::execute(&job, &ctx);
                if tx.send(result).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut results: Vec<JobResult> = rx.iter().collect();
    for handle in handles {
        let _ = handle.join();
    }

    debug_assert_eq!(results.len(), job_count);

    // Stable report order for summaries; completion order is meaningless.
    results.sort_by_key(|r| r.tier as usize);
    results
}
