//! Scheduling policy derivation
//!
//! Computes the effective worker count once, up front, from the backend's
//! concurrency class and the user's parallelism intent. The worker count is
//! an explicit invariant: it never exceeds the class's session ceiling, no
//! matter how much parallelism was requested.

use std::thread::available_parallelism;

use super::hardware::ConcurrencyClass;

/// Upper bound on ManySessions fan-out. Even datacenter encode engines gain
/// nothing from more simultaneous sessions than this for a single ladder.
pub const MANY_SESSION_CEILING: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Derived run configuration: how many workers, and whether the run counts
/// as parallel at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingPolicy {
    pub workers: usize,
    pub mode: ExecutionMode,
}

impl SchedulingPolicy {
    /// Derive the effective policy.
    ///
    /// Without `--parallel` the answer is always one worker. With it, the
    /// concurrency class caps the pool: a `SingleSession` backend degrades
    /// silently to one worker rather than erroring.
    pub fn derive(
        class: ConcurrencyClass,
        parallel_requested: bool,
        job_count: usize,
        logical_cores: usize,
    ) -> Self {
        if !parallel_requested {
            return Self {
                workers: 1,
                mode: ExecutionMode::Sequential,
            };
        }

        let ceiling = match class {
            ConcurrencyClass::SingleSession => 1,
            ConcurrencyClass::LimitedSessions(n) => n as usize,
            ConcurrencyClass::ManySessions => MANY_SESSION_CEILING,
            ConcurrencyClass::CpuBound => logical_cores,
        };

        let workers = ceiling.min(job_count).max(1);
        let mode = if workers > 1 {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };

        Self { workers, mode }
    }
}

/// Logical core count, defaulting to 1 when the query fails.
pub fn logical_cores() -> usize {
    available_parallelism().map(|n| n.get()).unwrap_or(1)
}
