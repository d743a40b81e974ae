use std::fs;
use std::path::Path;

use anyhow::Context as _;

use crate::codec::{ArtifactHandle, VideoCodec, ensure_parent_dir};
use crate::foundation::error::TabvidResult;
use crate::frame::pack::FrameSequence;
use crate::frame::pixel_format::PixelFormat;
use crate::recipe::rule::CodecOptions;

/// Codec that writes frame bytes verbatim, one frame after another.
///
/// Always lossless. A substituted format makes [`VideoCodec::probe_pixel_format`] report a layout
/// other than the one written, the way a real codec silently converts unsupported input.
#[derive(Clone, Debug, Default)]
pub struct RawFileCodec {
    substitute: Option<PixelFormat>,
}

impl RawFileCodec {
    /// Faithful raw codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw codec whose probe reports `format` regardless of what was written.
    pub fn with_substituted_format(format: PixelFormat) -> Self {
        Self {
            substitute: Some(format),
        }
    }
}

impl VideoCodec for RawFileCodec {
    fn encode(
        &self,
        frames: &FrameSequence,
        _options: &CodecOptions,
        _frame_rate: u32,
        path: &Path,
    ) -> TabvidResult<ArtifactHandle> {
        ensure_parent_dir(path)?;
        let geometry = frames.geometry();
        let mut bytes = Vec::with_capacity(geometry.frame_bytes() * geometry.frames);
        for f in &frames.frames {
            bytes.extend_from_slice(f);
        }
        fs::write(path, &bytes).with_context(|| format!("write raw frames '{}'", path.display()))?;
        Ok(ArtifactHandle {
            path: path.to_path_buf(),
            geometry,
        })
    }

    fn decode(&self, artifact: &ArtifactHandle) -> TabvidResult<FrameSequence> {
        let bytes = fs::read(&artifact.path)
            .with_context(|| format!("read raw frames '{}'", artifact.path.display()))?;
        FrameSequence::from_raw(artifact.geometry, &bytes)
    }

    fn probe_pixel_format(&self, artifact: &ArtifactHandle) -> TabvidResult<String> {
        let fmt = self.substitute.unwrap_or(artifact.geometry.pixel_format);
        Ok(fmt.name().to_string())
    }

    fn is_lossless(&self, _options: &CodecOptions, _pixel_format: PixelFormat) -> bool {
        true
    }

    fn container(&self, options: &CodecOptions) -> String {
        options.container().unwrap_or("raw").to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/raw.rs"]
mod tests;
