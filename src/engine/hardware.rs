//! Hardware acceleration backend detection and resolution
//!
//! Maps a requested backend (or `auto`) to a [`BackendDescriptor`] carrying
//! the ffmpeg encoder name and the backend's concurrency class. Probing is
//! separated from resolution: availability is snapshotted once from the local
//! ffmpeg build (plus `nvidia-smi`), and resolution over that snapshot is a
//! pure function so tests can inject synthetic hardware.

use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::EncodeError;

/// Supported encoder backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Software,
    Nvenc,
    Qsv,
    Amf,
    VideoToolbox,
    Vaapi,
}

impl Backend {
    /// Get the FFmpeg H.264 encoder name for this backend.
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Self::Software => "libx264",
            Self::Nvenc => "h264_nvenc",
            Self::Qsv => "h264_qsv",
            Self::Amf => "h264_amf",
            Self::VideoToolbox => "h264_videotoolbox",
            Self::Vaapi => "h264_vaapi",
        }
    }

    /// Get user-friendly display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Software => "libx264 (Software)",
            Self::Nvenc => "NVENC (NVIDIA)",
            Self::Qsv => "Quick Sync (Intel)",
            Self::Amf => "AMF (AMD)",
            Self::VideoToolbox => "VideoToolbox (Apple)",
            Self::Vaapi => "VAAPI (Linux)",
        }
    }

    /// Check if this is a hardware backend
    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::Software)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How many simultaneous encode sessions a backend usefully supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyClass {
    /// Sessions serialize in the driver; extra workers queue without speedup.
    SingleSession,
    /// A fixed session cap beyond which the driver rejects or serializes.
    LimitedSessions(u32),
    /// Independent encode engines; parallel sessions scale.
    ManySessions,
    /// Scales with available logical cores, not a fixed session count.
    CpuBound,
}

/// The resolved backend for a run. Created once at startup, read-only after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub backend: Backend,
    pub encoder: &'static str,
    pub concurrency: ConcurrencyClass,
}

/// What the user asked for with `--hw-accel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwAccelRequest {
    Auto,
    Backend(Backend),
}

impl FromStr for HwAccelRequest {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "none" | "software" => Ok(Self::Backend(Backend::Software)),
            "nvenc" => Ok(Self::Backend(Backend::Nvenc)),
            "qsv" => Ok(Self::Backend(Backend::Qsv)),
            "amf" => Ok(Self::Backend(Backend::Amf)),
            "videotoolbox" => Ok(Self::Backend(Backend::VideoToolbox)),
            "vaapi" => Ok(Self::Backend(Backend::Vaapi)),
            other => Err(EncodeError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Snapshot of which hardware encoders this machine can actually use.
#[derive(Debug, Clone, Default)]
pub struct EncoderAvailability {
    pub nvenc: bool,
    pub qsv: bool,
    pub amf: bool,
    pub videotoolbox: bool,
    pub vaapi: bool,
    /// GPU name from nvidia-smi, when present. Drives the consumer vs
    /// workstation NVENC session-class decision.
    pub nvidia_gpu: Option<String>,
}

/// Cache for the output of `ffmpeg -encoders`.
static FFMPEG_ENCODERS_OUTPUT_CACHE: OnceLock<String> = OnceLock::new();

fn ffmpeg_encoders_output() -> &'static str {
    FFMPEG_ENCODERS_OUTPUT_CACHE.get_or_init(|| {
        Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output()
            .ok()
            .map(|o| String::from_utf8_lossy(&o.stdout).to_string())
            .unwrap_or_default()
    })
}

/// Detect NVIDIA GPU model using nvidia-smi.
pub fn detect_nvidia_gpu() -> Option<String> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let name = stdout.lines().next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl EncoderAvailability {
    /// Probe the local machine. Probe failures are non-fatal: a missing tool
    /// or encoder simply reads as unavailable.
    pub fn detect() -> Self {
        let encoders = ffmpeg_encoders_output();
        let nvidia_gpu = detect_nvidia_gpu();

        Self {
            nvenc: encoders.contains("h264_nvenc") && nvidia_gpu.is_some(),
            qsv: encoders.contains("h264_qsv"),
            amf: encoders.contains("h264_amf"),
            videotoolbox: encoders.contains("h264_videotoolbox"),
            vaapi: encoders.contains("h264_vaapi"),
            nvidia_gpu,
        }
    }

    pub fn has(&self, backend: Backend) -> bool {
        match backend {
            Backend::Software => true,
            Backend::Nvenc => self.nvenc,
            Backend::Qsv => self.qsv,
            Backend::Amf => self.amf,
            Backend::VideoToolbox => self.videotoolbox,
            Backend::Vaapi => self.vaapi,
        }
    }
}

/// GPU name substrings that indicate a workstation/datacenter NVIDIA part
/// with multiple independent NVENC engines.
const WORKSTATION_GPU_MARKERS: &[&str] = &[
    "quadro", "tesla", "rtx a", "a100", "a40", "a6000", "a5000", "a4000", "a2000", "t4", "t1000",
    "p4000", "p2000",
];

fn is_workstation_gpu(name: &str) -> bool {
    let lower = name.to_lowercase();
    WORKSTATION_GPU_MARKERS.iter().any(|m| lower.contains(m))
}

/// The concurrency class table. Consumer NVENC serializes sessions;
/// workstation parts and the fixed-function Intel/AMD blocks scale;
/// VideoToolbox contends on unified memory; VAAPI drivers cap sessions.
fn concurrency_class(backend: Backend, avail: &EncoderAvailability) -> ConcurrencyClass {
    match backend {
        Backend::Nvenc => {
            let workstation = avail
                .nvidia_gpu
                .as_deref()
                .map(is_workstation_gpu)
                .unwrap_or(false);
            if workstation {
                ConcurrencyClass::ManySessions
            } else {
                ConcurrencyClass::SingleSession
            }
        }
        Backend::Qsv | Backend::Amf => ConcurrencyClass::ManySessions,
        Backend::VideoToolbox => ConcurrencyClass::SingleSession,
        Backend::Vaapi => ConcurrencyClass::LimitedSessions(2),
        Backend::Software => ConcurrencyClass::CpuBound,
    }
}

fn descriptor(backend: Backend, avail: &EncoderAvailability) -> BackendDescriptor {
    BackendDescriptor {
        backend,
        encoder: backend.encoder_name(),
        concurrency: concurrency_class(backend, avail),
    }
}

/// Probe order for `auto`: hardware backends before software.
const AUTO_PROBE_ORDER: [Backend; 5] = [
    Backend::Nvenc,
    Backend::Qsv,
    Backend::VideoToolbox,
    Backend::Amf,
    Backend::Vaapi,
];

/// Walk the ordered probe list and return the first usable hardware backend.
pub fn first_available(avail: &EncoderAvailability) -> Result<Backend, EncodeError> {
    AUTO_PROBE_ORDER
        .iter()
        .copied()
        .find(|&b| avail.has(b))
        .ok_or(EncodeError::NoBackendAvailable)
}

/// Resolve a backend request against an availability snapshot.
///
/// `auto` takes the first available hardware backend, falling back to
/// software when none is usable. A named hardware backend whose encoder is
/// missing fails fast with [`EncodeError::UnsupportedBackend`].
pub fn resolve(
    request: HwAccelRequest,
    avail: &EncoderAvailability,
) -> Result<BackendDescriptor, EncodeError> {
    match request {
        HwAccelRequest::Auto => {
            let backend = first_available(avail).unwrap_or(Backend::Software);
            Ok(descriptor(backend, avail))
        }
        HwAccelRequest::Backend(backend) => {
            if !avail.has(backend) {
                return Err(EncodeError::UnsupportedBackend(format!(
                    "{} requested but {} is not available in this ffmpeg build",
                    backend.display_name(),
                    backend.encoder_name()
                )));
            }
            Ok(descriptor(backend, avail))
        }
    }
}
