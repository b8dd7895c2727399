//! Encode job execution
//!
//! Runs one rendition through the external encoder and classifies the
//! outcome. The encoder is a black box invoked with an argv built from the
//! rendition spec and the backend descriptor; this layer never retries.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::error::EncodeError;
use super::hardware::{Backend, BackendDescriptor};
use super::ladder::{QualityTier, RenditionSpec};
use super::output::OutputManager;

/// Poll interval for the wait/cancel/watchdog loop.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Keep at most this much encoder stderr in a failure diagnostic.
const STDERR_TAIL_BYTES: usize = 4096;

/// x264 tuning applied to best-quality software encodes.
const X264_ADVANCED_PARAMS: &str =
    "ref=5:bframes=5:b-adapt=2:direct=auto:me=umh:subme=9:trellis=2:aq-mode=3:aq-strength=0.8";

/// One rendition to encode. Owned by the scheduler until dispatch, then by
/// exactly one worker for its lifetime.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub id: Uuid,
    pub spec: RenditionSpec,
    pub backend: BackendDescriptor,
    pub input: PathBuf,
}

impl EncodeJob {
    pub fn new(spec: RenditionSpec, backend: BackendDescriptor, input: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            backend,
            input,
        }
    }
}

/// A finalized rendition on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRendition {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Outcome of one job. Self-identifying: completion order under parallel
/// execution carries no meaning, the id and tier do.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: Uuid,
    pub tier: QualityTier,
    pub outcome: Result<EncodedRendition, EncodeError>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn cancelled(job: &EncodeJob) -> Self {
        Self {
            job_id: job.id,
            tier: job.spec.tier,
            outcome: Err(EncodeError::Cancelled),
        }
    }
}

/// Shared, read-only run configuration. The cancellation flag is the only
/// mutable bit; each worker owns its own process handle and staging path.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Encoder executable; overridable so tests can substitute a stub.
    pub encoder_program: String,
    pub outputs: OutputManager,
    pub cancel: Arc<AtomicBool>,
    /// Optional per-job watchdog. Expiry cancels that job alone.
    pub timeout: Option<Duration>,
}

impl RunContext {
    pub fn new(outputs: OutputManager) -> Self {
        Self {
            encoder_program: "ffmpeg".to_string(),
            outputs,
            cancel: Arc::new(AtomicBool::new(false)),
            timeout: None,
        }
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn preset_to_nvenc(preset: &str) -> &'static str {
    match preset {
        "slow" => "p7",
        "fast" => "p3",
        _ => "p5",
    }
}

/// Build the full encoder argv for a job, writing to `staged`.
pub fn build_encoder_args(job: &EncodeJob, staged: &Path) -> Vec<String> {
    let spec = &job.spec;
    let crf = spec.crf.to_string();
    let bitrate = format!("{}k", spec.video_bitrate_k);
    let maxrate = format!("{}k", spec.maxrate_k);
    let bufsize = format!("{}k", spec.bufsize_k);

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-y".into(),
        "-nostdin".into(),
        "-i".into(),
        job.input.to_string_lossy().to_string(),
    ];

    // Height is clamped to the source so a 480p input never upscales to a
    // 1080p rendition. VAAPI encodes on a hardware surface, so scaling
    // happens after upload.
    let height = format!("min({}\\,ih)", spec.height);
    if job.backend.backend == Backend::Vaapi {
        args.extend([
            "-vf".into(),
            format!("format=nv12,hwupload,scale_vaapi=-2:{height}"),
        ]);
    } else {
        args.extend(["-vf".into(), format!("scale=-2:{height}")]);
    }

    match job.backend.backend {
        Backend::Software => {
            args.extend([
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                spec.preset.into(),
                "-profile:v".into(),
                "high".into(),
                "-level".into(),
                "4.1".into(),
                "-crf".into(),
                crf,
            ]);
            if spec.use_advanced {
                args.extend(["-x264-params".into(), X264_ADVANCED_PARAMS.into()]);
            }
        }
        Backend::Nvenc => {
            args.extend([
                "-c:v".into(),
                "h264_nvenc".into(),
                "-preset".into(),
                preset_to_nvenc(spec.preset).into(),
                "-profile:v".into(),
                "high".into(),
                "-level".into(),
                "4.1".into(),
                "-rc:v".into(),
                "vbr".into(),
                "-cq:v".into(),
                crf,
                "-b:v".into(),
                bitrate,
                "-maxrate:v".into(),
                maxrate,
                "-bufsize:v".into(),
                bufsize,
                "-spatial_aq".into(),
                "1".into(),
                "-temporal_aq".into(),
                "1".into(),
            ]);
        }
        Backend::Qsv => {
            let preset = if spec.preset == "slow" { "veryslow" } else { spec.preset };
            args.extend([
                "-c:v".into(),
                "h264_qsv".into(),
                "-preset".into(),
                preset.into(),
                "-profile:v".into(),
                "high".into(),
                "-level".into(),
                "4.1".into(),
                "-global_quality".into(),
                crf,
                "-b:v".into(),
                bitrate,
                "-maxrate".into(),
                maxrate,
                "-bufsize".into(),
                bufsize,
            ]);
        }
        Backend::VideoToolbox => {
            args.extend([
                "-c:v".into(),
                "h264_videotoolbox".into(),
                "-profile:v".into(),
                "high".into(),
                "-level".into(),
                "4.1".into(),
                "-b:v".into(),
                bitrate,
                "-maxrate".into(),
                maxrate,
                "-bufsize".into(),
                bufsize,
                "-allow_sw".into(),
                "1".into(),
            ]);
        }
        Backend::Amf => {
            args.extend([
                "-c:v".into(),
                "h264_amf".into(),
                "-quality".into(),
                "quality".into(),
                "-profile:v".into(),
                "high".into(),
                "-level".into(),
                "4.1".into(),
                "-rc".into(),
                "vbr_latency".into(),
                "-qp_i".into(),
                crf.clone(),
                "-qp_p".into(),
                crf,
                "-b:v".into(),
                bitrate,
                "-maxrate".into(),
                maxrate,
                "-bufsize".into(),
                bufsize,
            ]);
        }
        Backend::Vaapi => {
            args.extend([
                "-vaapi_device".into(),
                "/dev/dri/renderD128".into(),
                "-c:v".into(),
                "h264_vaapi".into(),
                "-profile:v".into(),
                "high".into(),
                "-level".into(),
                "4.1".into(),
                "-qp".into(),
                crf,
                "-b:v".into(),
                bitrate,
                "-maxrate".into(),
                maxrate,
                "-bufsize".into(),
                bufsize,
            ]);
        }
    }

    args.extend([
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", spec.audio_bitrate_k),
        "-ar".into(),
        "48000".into(),
        "-movflags".into(),
        "+faststart".into(),
        staged.to_string_lossy().to_string(),
    ]);

    args
}

/// Render a job's encoder command line for logging and dry runs.
pub fn format_encoder_cmd(job: &EncodeJob, ctx: &RunContext) -> String {
    let staged = ctx.outputs.staging_path(&job.input, job.spec.tier, job.id);
    let args = build_encoder_args(job, &staged);
    format!("{} {}", ctx.encoder_program, args.join(" "))
}

fn stderr_tail(stderr: &str) -> String {
    if stderr.len() <= STDERR_TAIL_BYTES {
        return stderr.to_string();
    }
    let start = stderr.len() - STDERR_TAIL_BYTES;
    // Snap to a char boundary
    let mut start = start;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].to_string()
}

/// Execute one job to completion and report its result. Any failure path
/// removes the staged file; the final name is only ever touched on success.
pub fn execute(job: &EncodeJob, ctx: &RunContext) -> JobResult {
    let staged = ctx.outputs.staging_path(&job.input, job.spec.tier, job.id);
    let final_path = ctx.outputs.final_path(&job.input, job.spec.tier);

    let outcome = run_encode(job, ctx, &staged, &final_path);
    if outcome.is_err() {
        ctx.outputs.discard(&staged);
    }

    match &outcome {
        Ok(rendition) => tracing::info!(
            tier = %job.spec.tier,
            path = %rendition.path.display(),
            size_bytes = rendition.size_bytes,
            "rendition finalized"
        ),
        Err(e) => tracing::warn!(tier = %job.spec.tier, kind = e.kind(), error = %e, "encode failed"),
    }

    JobResult {
        job_id: job.id,
        tier: job.spec.tier,
        outcome,
    }
}

fn run_encode(
    job: &EncodeJob,
    ctx: &RunContext,
    staged: &Path,
    final_path: &Path,
) -> Result<EncodedRendition, EncodeError> {
    let args = build_encoder_args(job, staged);

    let mut cmd = Command::new(&ctx.encoder_program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| EncodeError::EncoderLaunch(format!("{}: {e}", ctx.encoder_program)))?;

    // Drain stderr on its own thread so a chatty encoder can't block on a
    // full pipe while we poll for exit.
    let stderr = child.stderr.take();
    let stderr_thread = thread::spawn(move || {
        let mut collected = String::new();
        if let Some(stderr) = stderr {
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    });

    let deadline = ctx.timeout.map(|t| Instant::now() + t);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EncodeError::EncoderLaunch(e.to_string()));
            }
        }

        if ctx.cancel_requested() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncodeError::Cancelled);
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                let secs = ctx.timeout.map(|t| t.as_secs()).unwrap_or(0);
                return Err(EncodeError::EncoderTimeout(secs));
            }
        }

        thread::sleep(POLL_INTERVAL);
    };

    let stderr_output = stderr_thread.join().unwrap_or_default();

    if !status.success() {
        return Err(EncodeError::EncoderExit {
            code: status.code(),
            stderr: stderr_tail(&stderr_output),
        });
    }

    // A zero exit with a missing or empty file is a silent encoder fault.
    let size_bytes = fs::metadata(staged).map(|m| m.len()).unwrap_or(0);
    if size_bytes == 0 {
        return Err(EncodeError::EncoderOutputMissing(
            staged.display().to_string(),
        ));
    }

    ctx.outputs.finalize(staged, final_path).map_err(|e| {
        EncodeError::EncoderOutputMissing(format!(
            "staged output could not be finalized to {}: {e}",
            final_path.display()
        ))
    })?;

    Ok(EncodedRendition {
        path: final_path.to_path_buf(),
        size_bytes,
    })
}
