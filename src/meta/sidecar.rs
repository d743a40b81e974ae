use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{DType, Shape};
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::frame::pack::FrameGeometry;
use crate::frame::pixel_format::PixelFormat;
use crate::quantize::normalize::NormalizationParams;
use crate::recipe::rule::ConversionRule;
use crate::reduce::pca::ReductionParams;

/// Sidecar layout understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Everything needed to turn one video artifact back into its source columns.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sidecar {
    /// Layout version; checked before anything else is parsed.
    pub format_version: u32,
    /// Array name (recipe key).
    pub name: String,
    /// Rule the artifact was produced from.
    pub rule: ConversionRule,
    /// Value <-> pixel map of the stored samples.
    pub normalization: NormalizationParams,
    /// Projection to undo, when the rule reduced channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduction: Option<ReductionParams>,
    /// Element type of the source columns.
    pub dtype: DType,
    /// Shape before reduction.
    pub original_shape: Shape,
    /// Shape of the packed samples.
    pub packed_shape: Shape,
    /// Source column names in frame element order.
    pub columns: Vec<String>,
    /// Pixel format the frames were packed in.
    pub pixel_format: PixelFormat,
    /// Pixel format the codec reported, when it was probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_pixel_format: Option<String>,
    /// Container extension of the video artifact.
    pub container: String,
    /// Frame rate handed to the codec.
    pub frame_rate: u32,
}

#[derive(serde::Deserialize)]
struct VersionProbe {
    format_version: Option<serde_json::Value>,
}

impl Sidecar {
    /// Frame geometry of the packed artifact.
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::for_shape(&self.packed_shape, self.pixel_format)
    }

    /// File name of the video artifact next to this sidecar.
    pub fn video_file_name(&self) -> String {
        format!("{}.{}", self.name, self.container)
    }

    /// Pretty JSON bytes.
    pub fn to_bytes(&self) -> TabvidResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| TabvidError::serde(format!("serialize sidecar '{}': {e}", self.name)))
    }

    /// Parse sidecar bytes, rejecting unknown layout versions before reading any other field.
    pub fn from_bytes(bytes: &[u8]) -> TabvidResult<Self> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| TabvidError::serde(format!("parse sidecar JSON: {e}")))?;
        match probe.format_version {
            None => {
                return Err(TabvidError::metadata_version(
                    "sidecar has no format_version",
                ));
            }
            Some(v) if v.as_u64() != Some(u64::from(FORMAT_VERSION)) => {
                return Err(TabvidError::metadata_version(format!(
                    "sidecar format_version {v} is not supported (expected {FORMAT_VERSION})"
                )));
            }
            Some(_) => {}
        }
        let sidecar: Self = serde_json::from_slice(bytes)
            .map_err(|e| TabvidError::serde(format!("parse sidecar fields: {e}")))?;
        sidecar.check_consistency()?;
        Ok(sidecar)
    }

    /// Cross-field checks; a sidecar that fails them cannot drive a decode.
    pub fn check_consistency(&self) -> TabvidResult<()> {
        if self.columns != self.rule.columns {
            return Err(TabvidError::shape_mismatch(format!(
                "sidecar '{}' lists columns that differ from its rule",
                self.name
            )));
        }
        if self.original_shape != self.rule.shape {
            return Err(TabvidError::shape_mismatch(format!(
                "sidecar '{}' original shape {} differs from rule shape {}",
                self.name, self.original_shape, self.rule.shape
            )));
        }
        let packed_channels = match &self.reduction {
            Some(r) => {
                if r.original_channel_count != self.original_shape.channels() {
                    return Err(TabvidError::reduction_dimension(format!(
                        "sidecar '{}' reduction expects {} channels, shape has {}",
                        self.name,
                        r.original_channel_count,
                        self.original_shape.channels()
                    )));
                }
                r.n_components()
            }
            None => self.original_shape.channels(),
        };
        let expected_packed = self.original_shape.with_channels(packed_channels)?;
        if self.packed_shape != expected_packed {
            return Err(TabvidError::shape_mismatch(format!(
                "sidecar '{}' packed shape {} should be {expected_packed}",
                self.name, self.packed_shape
            )));
        }
        if self.pixel_format.channels() != packed_channels
            || self.pixel_format.bit_depth() != self.normalization.bit_depth
        {
            return Err(TabvidError::shape_mismatch(format!(
                "sidecar '{}' pixel format {} cannot hold {packed_channels} channels of {} bits",
                self.name,
                self.pixel_format,
                self.normalization.bit_depth.bits()
            )));
        }
        Ok(())
    }
}

/// Serialize a sidecar record.
pub fn serialize_sidecar(sidecar: &Sidecar) -> TabvidResult<Vec<u8>> {
    sidecar.to_bytes()
}

/// Deserialize a sidecar record.
pub fn deserialize_sidecar(bytes: &[u8]) -> TabvidResult<Sidecar> {
    Sidecar::from_bytes(bytes)
}

/// Directory holding every artifact of one job.
pub fn job_dir(output: &Path, job_id: &str) -> PathBuf {
    output.join(job_id)
}

/// `<output>/<job_id>/<name>.json`.
pub fn sidecar_path(output: &Path, job_id: &str, name: &str) -> PathBuf {
    job_dir(output, job_id).join(format!("{name}.json"))
}

/// Write `sidecar` to `path` through a temporary file so readers never see a partial record.
pub fn write_sidecar(path: &Path, sidecar: &Sidecar) -> TabvidResult<()> {
    let bytes = sidecar.to_bytes()?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &bytes)
        .with_context(|| format!("write sidecar '{}'", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(anyhow::Error::new(e)
            .context(format!("publish sidecar '{}'", path.display()))
            .into());
    }
    Ok(())
}

/// Read and parse the sidecar at `path`.
pub fn read_sidecar(path: &Path) -> TabvidResult<Sidecar> {
    let bytes = fs::read(path).with_context(|| format!("read sidecar '{}'", path.display()))?;
    Sidecar::from_bytes(&bytes)
}

#[cfg(test)]
#[path = "../../tests/unit/meta/sidecar.rs"]
mod tests;
