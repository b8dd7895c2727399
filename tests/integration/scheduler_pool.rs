// Scheduler pool semantics: drain-everything, concurrency caps, FIFO dispatch

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::common;
use ffladder::engine::{
    scheduler, ConcurrencyClass, EncodeError, ExecutionMode, RunSummary, SchedulingPolicy,
};

/// Stub that logs start/end timestamps so tests can reconstruct how many
/// encoder processes were alive at once.
fn logging_stub(dir: &Path, log: &Path, sleep: &str) -> std::path::PathBuf {
    let body = format!(
        "echo \"start $(date +%s%N) $out\" >> {log}\nsleep {sleep}\nprintf 'fake rendition' > \"$out\"\necho \"end $(date +%s%N) $out\" >> {log}",
        log = log.display(),
    );
    common::write_stub(dir, "encoder-logged.sh", &body)
}

/// Maximum number of simultaneously running stub processes, from the log.
fn max_overlap(log: &Path) -> usize {
    let mut events: Vec<(u128, i64)> = fs::read_to_string(log)
        .unwrap()
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let kind = parts.next()?;
            let ts: u128 = parts.next()?.parse().ok()?;
            Some((ts, if kind == "start" { 1 } else { -1 }))
        })
        .collect();
    events.sort();

    let mut running = 0i64;
    let mut max = 0i64;
    for (_, delta) in events {
        running += delta;
        max = max.max(running);
    }
    max as usize
}

fn start_order(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("start "))
        .filter_map(|l| l.split_whitespace().last().map(|s| s.to_string()))
        .collect()
}

#[test]
fn test_failure_does_not_halt_siblings() {
    let tmp = TempDir::new().unwrap();
    let input = common::fake_input(tmp.path());
    // Medium fails, the rest succeed
    let stub = common::write_stub(
        tmp.path(),
        "encoder-mixed.sh",
        "case \"$out\" in\n  *-medium.*) echo 'encoder blew up' >&2; exit 3 ;;\nesac\nprintf 'fake rendition' > \"$out\"",
    );
    let dest = tmp.path().join("out");
    let ctx = common::stub_ctx(&stub, &dest);

    let jobs = common::make_jobs(&input, None);
    let policy = SchedulingPolicy {
        workers: 1,
        mode: ExecutionMode::Sequential,
    };
    let results = scheduler::run(jobs, &policy, &ctx);

    assert_eq!(results.len(), 3, "one result per job, always");
    let summary = RunSummary::from_results(&results);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let failed = results.iter().find(|r| !r.is_success()).unwrap();
    assert_eq!(failed.tier.as_str(), "medium");
    assert!(matches!(
        failed.outcome,
        Err(EncodeError::EncoderExit { code: Some(3), .. })
    ));

    // Successful tiers landed under final names; the failure staged nothing
    assert!(dest.join("clip-high.mp4").is_file());
    assert!(dest.join("clip-low.mp4").is_file());
    assert!(!dest.join("clip-medium.mp4").exists());
    assert!(common::part_files(&dest).is_empty());
}

#[test]
fn test_pool_never_exceeds_worker_cap() {
    let tmp = TempDir::new().unwrap();
    let input = common::fake_input(tmp.path());
    let log = tmp.path().join("overlap.log");
    let stub = logging_stub(tmp.path(), &log, "0.4");
    let dest = tmp.path().join("out");
    let ctx = common::stub_ctx(&stub, &dest);

    let jobs = common::make_jobs(&input, None);
    let policy = SchedulingPolicy::derive(ConcurrencyClass::LimitedSessions(2), true, jobs.len(), 16);
    assert_eq!(policy.workers, 2);

    let results = scheduler::run(jobs, &policy, &ctx);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));

    let overlap = max_overlap(&log);
    assert!(overlap <= 2, "session cap exceeded: {overlap} concurrent encoders");
    assert!(overlap >= 2, "pool never actually ran in parallel");
}

#[test]
fn test_sequential_run_is_strictly_serial_and_fifo() {
    let tmp = TempDir::new().unwrap();
    let input = common::fake_input(tmp.path());
    let log = tmp.path().join("serial.log");
    let stub = logging_stub(tmp.path(), &log, "0.1");
    let dest = tmp.path().join("out");
    let ctx = common::stub_ctx(&stub, &dest);

    let jobs = common::make_jobs(&input, None);
    let policy = SchedulingPolicy {
        workers: 1,
        mode: ExecutionMode::Sequential,
    };
    let results = scheduler::run(jobs, &policy, &ctx);
    assert_eq!(results.len(), 3);

    assert_eq!(max_overlap(&log), 1);

    // Dispatch follows planned ladder order: high, medium, low
    let order = start_order(&log);
    assert_eq!(order.len(), 3);
    assert!(order[0].contains("-high."), "got {order:?}");
    assert!(order[1].contains("-medium."), "got {order:?}");
    assert!(order[2].contains("-low."), "got {order:?}");
}

#[test]
fn test_every_result_traceable_to_its_job() {
    let tmp = TempDir::new().unwrap();
    let input = common::fake_input(tmp.path());
    let stub = common::ok_stub(tmp.path());
    let dest = tmp.path().join("out");
    let ctx = common::stub_ctx(&stub, &dest);

    let jobs = common::make_jobs(&input, None);
    let job_ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
    let policy = SchedulingPolicy::derive(ConcurrencyClass::ManySessions, true, jobs.len(), 16);

    let results = scheduler::run(jobs, &policy, &ctx);
    assert_eq!(results.len(), job_ids.len());
    for id in job_ids {
        assert!(
            results.iter().any(|r| r.job_id == id),
            "job {id} has no result"
        );
    }
}
