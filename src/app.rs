//! Top-level run orchestration
//!
//! Everything between argument parsing and the process exit code lives here
//! so the whole flow, dry runs included, is callable from tests.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::engine::{
    executor::format_encoder_cmd, hardware, ladder, policy, probe, scheduler, EncodeJob,
    EncoderAvailability, HwAccelRequest, OutputManager, QualitySelection, RunContext, RunSummary,
    SchedulingPolicy,
};

/// Exit code when the run was interrupted by the user.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Run one ladder encode end to end and return the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    if !cli.input.is_file() {
        bail!("input file not found: {}", cli.input.display());
    }

    // Planning and backend resolution fail fast, before any job runs.
    let selection = QualitySelection {
        tiers: cli.explicit_qualities.clone(),
        best_quality: cli.best_quality,
    };
    let specs = ladder::plan(&selection)?;

    let request: HwAccelRequest = cli.hw_accel.parse()?;
    let availability = EncoderAvailability::detect();
    let backend = hardware::resolve(request, &availability)?;
    info!(
        backend = backend.backend.display_name(),
        encoder = backend.encoder,
        class = ?backend.concurrency,
        "resolved encoder backend"
    );

    let policy = SchedulingPolicy::derive(
        backend.concurrency,
        cli.parallel,
        specs.len(),
        policy::logical_cores(),
    );
    if cli.parallel && policy.workers == 1 {
        info!("backend serializes encode sessions; running sequentially");
    }
    info!(workers = policy.workers, mode = ?policy.mode, tiers = specs.len(), "scheduling policy");

    // Informational only; a file ffprobe can't read may still encode.
    match probe::probe_input(&cli.input) {
        Ok(p) => info!(duration_s = ?p.duration_s, size_bytes = ?p.size_bytes, "probed input"),
        Err(e) => warn!("input probe failed: {e:#}"),
    }

    let outputs = OutputManager::new(&cli.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            cli.output_dir.display()
        )
    })?;

    let jobs: Vec<EncodeJob> = specs
        .into_iter()
        .map(|spec| EncodeJob::new(spec, backend, cli.input.clone()))
        .collect();

    let mut ctx = RunContext::new(outputs);
    ctx.timeout = cli.timeout_secs.map(Duration::from_secs);

    // A dry run only prints the plan; it needs no encoder on this machine.
    if cli.dry_run {
        for job in &jobs {
            println!("{}", format_encoder_cmd(job, &ctx));
        }
        info!(jobs = jobs.len(), "dry run complete, nothing encoded");
        return Ok(0);
    }

    let version = probe::ffmpeg_version()?;
    info!(version = %version, "ffmpeg available");

    if !cli.overwrite {
        let tiers: Vec<_> = jobs.iter().map(|j| j.spec.tier).collect();
        let existing = ctx.outputs.existing_finals(&cli.input, &tiers);
        if !existing.is_empty() {
            let names: Vec<String> = existing
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            bail!(
                "output files already exist ({}); pass --overwrite to replace them",
                names.join(", ")
            );
        }
    }

    let cancel = Arc::clone(&ctx.cancel);
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .context("failed to install interrupt handler")?;

    let results = scheduler::run(jobs, &policy, &ctx);
    let summary = RunSummary::from_results(&results);

    for result in &results {
        match &result.outcome {
            Ok(rendition) => info!(
                tier = %result.tier,
                path = %rendition.path.display(),
                size_bytes = rendition.size_bytes,
                "ok"
            ),
            Err(e) => error!(tier = %result.tier, kind = e.kind(), "failed: {e}"),
        }
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "run complete"
    );

    if ctx.cancel_requested() {
        warn!("run interrupted");
        return Ok(EXIT_INTERRUPTED);
    }

    Ok(if summary.all_succeeded() { 0 } else { 1 })
}
