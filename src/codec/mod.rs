//! Video codec boundary.
//!
//! The orchestrator only talks to [`VideoCodec`]; [`ffmpeg::FfmpegCodec`] drives the system
//! `ffmpeg`/`ffprobe` binaries and [`raw::RawFileCodec`] stores frames uncompressed.

/// `ffmpeg`/`ffprobe` subprocess codec.
pub mod ffmpeg;
/// Uncompressed on-disk frames.
pub mod raw;

use std::path::{Path, PathBuf};

use crate::foundation::error::TabvidResult;
use crate::frame::pack::{FrameGeometry, FrameSequence};
use crate::frame::pixel_format::PixelFormat;
use crate::recipe::rule::CodecOptions;

/// A written video artifact and the geometry needed to read it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Location of the video file.
    pub path: PathBuf,
    /// Frame count and layout stored in the file.
    pub geometry: FrameGeometry,
}

/// Capability the encode/decode pipeline needs from a video backend.
pub trait VideoCodec: Send + Sync {
    /// Write `frames` to `path` using `options`.
    fn encode(
        &self,
        frames: &FrameSequence,
        options: &CodecOptions,
        frame_rate: u32,
        path: &Path,
    ) -> TabvidResult<ArtifactHandle>;

    /// Read every frame of `artifact` back in its recorded pixel format.
    fn decode(&self, artifact: &ArtifactHandle) -> TabvidResult<FrameSequence>;

    /// Pixel format name the stored stream actually uses.
    fn probe_pixel_format(&self, artifact: &ArtifactHandle) -> TabvidResult<String>;

    /// Whether `options` with `pixel_format` reproduce samples bit-exactly.
    fn is_lossless(&self, options: &CodecOptions, pixel_format: PixelFormat) -> bool;

    /// File extension for artifacts written with `options`.
    fn container(&self, options: &CodecOptions) -> String;
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> TabvidResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
