//! Quality ladder planning
//!
//! Turns the user's tier selection into an ordered, deduplicated list of
//! rendition specs. The canonical ladder order (high, medium, low) is fixed;
//! selection only filters it, never reorders it. Planning is pure: no probing
//! and no filesystem access happens here.

use std::fmt;
use std::str::FromStr;

use super::error::EncodeError;

/// The three quality tiers, in canonical ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

/// Canonical planning order. Selections are filtered against this, so the
/// planned ladder is always a subsequence of it.
pub const CANONICAL_LADDER: [QualityTier; 3] =
    [QualityTier::High, QualityTier::Medium, QualityTier::Low];

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(EncodeError::InvalidSelection(format!(
                "unknown quality tier '{other}' (expected high, medium or low)"
            ))),
        }
    }
}

/// One planned rendition: a quality tier plus the encoder parameters that
/// produce it. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionSpec {
    pub tier: QualityTier,
    pub height: u32,
    pub video_bitrate_k: u32,
    pub maxrate_k: u32,
    pub bufsize_k: u32,
    pub crf: u8,
    pub preset: &'static str,
    pub audio_bitrate_k: u32,
    /// Apply the extended x264 tuning string on software encodes.
    pub use_advanced: bool,
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct QualitySelection {
    /// Explicit tier names; `None` selects the full ladder.
    pub tiers: Option<Vec<String>>,
    pub best_quality: bool,
}

fn rendition(tier: QualityTier, best_quality: bool) -> RenditionSpec {
    match (tier, best_quality) {
        (QualityTier::High, false) => RenditionSpec {
            tier,
            height: 1080,
            video_bitrate_k: 5000,
            maxrate_k: 5350,
            bufsize_k: 7500,
            crf: 21,
            preset: "medium",
            audio_bitrate_k: 192,
            use_advanced: false,
        },
        (QualityTier::Medium, false) => RenditionSpec {
            tier,
            height: 720,
            video_bitrate_k: 2800,
            maxrate_k: 3000,
            bufsize_k: 4200,
            crf: 23,
            preset: "medium",
            audio_bitrate_k: 128,
            use_advanced: false,
        },
        (QualityTier::Low, false) => RenditionSpec {
            tier,
            height: 480,
            video_bitrate_k: 1400,
            maxrate_k: 1500,
            bufsize_k: 2100,
            crf: 26,
            preset: "fast",
            audio_bitrate_k: 96,
            use_advanced: false,
        },
        (QualityTier::High, true) => RenditionSpec {
            tier,
            height: 1080,
            video_bitrate_k: 6000,
            maxrate_k: 6500,
            bufsize_k: 9000,
            crf: 19,
            preset: "slow",
            audio_bitrate_k: 256,
            use_advanced: true,
        },
        (QualityTier::Medium, true) => RenditionSpec {
            tier,
            height: 720,
            video_bitrate_k: 3500,
            maxrate_k: 3800,
            bufsize_k: 5200,
            crf: 21,
            preset: "slow",
            audio_bitrate_k: 192,
            use_advanced: true,
        },
        (QualityTier::Low, true) => RenditionSpec {
            tier,
            height: 480,
            video_bitrate_k: 1800,
            maxrate_k: 2000,
            bufsize_k: 2700,
            crf: 23,
            preset: "medium",
            audio_bitrate_k: 128,
            use_advanced: true,
        },
    }
}

/// Plan the rendition ladder for a selection.
///
/// Explicit tiers are parsed strictly; an unknown name or an empty list is an
/// error rather than a silent no-op. Duplicates collapse, and the result
/// always follows canonical ladder order regardless of how the tiers were
/// written on the command line.
pub fn plan(selection: &QualitySelection) -> Result<Vec<RenditionSpec>, EncodeError> {
    let requested: Vec<QualityTier> = match &selection.tiers {
        None => CANONICAL_LADDER.to_vec(),
        Some(names) => {
            if names.is_empty() {
                return Err(EncodeError::InvalidSelection(
                    "no quality tiers selected".to_string(),
                ));
            }
            names
                .iter()
                .map(|name| name.parse::<QualityTier>())
                .collect::<Result<_, _>>()?
        }
    };

    Ok(CANONICAL_LADDER
        .iter()
        .copied()
        .filter(|tier| requested.contains(tier))
        .map(|tier| rendition(tier, selection.best_quality))
        .collect())
}
