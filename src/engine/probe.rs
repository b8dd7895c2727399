//! Input inspection via ffprobe

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

/// Basic facts about the input file. Informational only: probe failures do
/// not block an encode run.
#[derive(Debug, Clone, Default)]
pub struct InputProbe {
    pub duration_s: Option<f64>,
    pub size_bytes: Option<u64>,
}

/// Check if ffmpeg is available and return its version line
pub fn ffmpeg_version() -> Result<String> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .context("Failed to execute ffmpeg. Is ffmpeg installed and in PATH?")?;

    if !output.status.success() {
        anyhow::bail!("ffmpeg command failed with status: {}", output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Probe a media file for duration and container size
pub fn probe_input(path: &Path) -> Result<InputProbe> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .context("Failed to execute ffprobe")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    parse_ffprobe_output(&json_str)
}

/// Parse ffprobe JSON output (separated for testing)
pub fn parse_ffprobe_output(json: &str) -> Result<InputProbe> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;

    Ok(InputProbe {
        duration_s: probe.format.duration.and_then(|d| d.parse::<f64>().ok()),
        size_bytes: probe.format.size.and_then(|s| s.parse::<u64>().ok()),
    })
}
