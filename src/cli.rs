use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ffladder")]
#[command(about = "Quality-ladder transcoder with backend-aware parallel scheduling", long_about = None)]
pub struct Cli {
    /// Input media file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Destination directory for finalized renditions (created if absent)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Hardware acceleration backend
    #[arg(
        long,
        value_name = "BACKEND",
        default_value = "auto",
        help = "auto, nvenc, qsv, amf, videotoolbox, vaapi, or none"
    )]
    pub hw_accel: String,

    /// Encode renditions concurrently when the backend's session class allows it
    #[arg(long)]
    pub parallel: bool,

    /// Use the full canonical ladder with slow presets and higher bitrates
    #[arg(long)]
    pub best_quality: bool,

    /// Comma-separated subset of the ladder (high,medium,low)
    #[arg(long, value_name = "TIERS", value_delimiter = ',')]
    pub explicit_qualities: Option<Vec<String>>,

    /// Per-job watchdog: cancel a single encode after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Plan and print encoder commands without encoding anything
    #[arg(long)]
    pub dry_run: bool,

    /// Replace existing output files instead of refusing to start
    #[arg(long)]
    pub overwrite: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
