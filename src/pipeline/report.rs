use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::foundation::core::Shape;
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::frame::pixel_format::PixelFormat;

/// Non-fatal conditions noticed while encoding a rule.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleWarning {
    /// Every value equals `value`; the artifact decodes to that constant.
    DegenerateRange {
        /// The single observed or declared value.
        value: f64,
    },
    /// NaN cells were replaced by the rule's fill policy.
    NanFilled {
        /// Number of replaced cells.
        count: usize,
        /// Replacement value.
        value: f64,
    },
}

impl std::fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateRange { value } => {
                write!(f, "degenerate value range: every element decodes to {value}")
            }
            Self::NanFilled { count, value } => write!(f, "{count} NaN cells filled with {value}"),
        }
    }
}

/// Outcome of one successfully encoded rule.
#[derive(Clone, Debug)]
pub struct RuleSummary {
    /// Array name.
    pub name: String,
    /// Published video artifact.
    pub video_path: PathBuf,
    /// Published sidecar.
    pub sidecar_path: PathBuf,
    /// Shape of the packed samples.
    pub packed_shape: Shape,
    /// Pixel format the frames were packed in.
    pub pixel_format: PixelFormat,
    /// Whether the affine value map was applied (false for verbatim integers).
    pub scaled: bool,
    /// Whether channels were reduced.
    pub reduced: bool,
    /// Whether the codec path reproduces pixels exactly.
    pub lossless: bool,
    /// Non-fatal conditions.
    pub warnings: Vec<RuleWarning>,
    /// Size of the selected columns in their source representation.
    pub original_bytes: u64,
    /// Size of the video artifact on disk.
    pub compressed_bytes: u64,
    /// Source element count.
    pub elements: usize,
    /// Time spent in the codec, probe included.
    pub write_time: Duration,
}

impl RuleSummary {
    /// `original_bytes / compressed_bytes`, `None` for an empty artifact.
    pub fn compression_ratio(&self) -> Option<f64> {
        (self.compressed_bytes > 0).then(|| self.original_bytes as f64 / self.compressed_bytes as f64)
    }

    /// Compressed bits per source element ("bits per pixel per band").
    pub fn bpppb(&self) -> Option<f64> {
        (self.elements > 0).then(|| self.compressed_bytes as f64 * 8.0 / self.elements as f64)
    }
}

/// Per-rule outcomes of one encode job.
#[derive(Debug)]
pub struct EncodeReport {
    /// Job identifier.
    pub job_id: String,
    /// Outcome per array name; a failed rule never hides the others.
    pub outcomes: BTreeMap<String, TabvidResult<RuleSummary>>,
}

impl EncodeReport {
    /// Rules that produced an artifact pair.
    pub fn succeeded(&self) -> impl Iterator<Item = &RuleSummary> {
        self.outcomes.values().filter_map(|o| o.as_ref().ok())
    }

    /// Rules that failed, with their error.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &TabvidError)> {
        self.outcomes
            .iter()
            .filter_map(|(n, o)| o.as_ref().err().map(|e| (n.as_str(), e)))
    }

    /// Whether every rule succeeded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.values().all(Result::is_ok)
    }

    /// Look up one rule's outcome.
    pub fn get(&self, name: &str) -> Option<&TabvidResult<RuleSummary>> {
        self.outcomes.get(name)
    }

    /// Total artifact bytes across successful rules.
    pub fn compressed_bytes(&self) -> u64 {
        self.succeeded().map(|s| s.compressed_bytes).sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/report.rs"]
mod tests;
