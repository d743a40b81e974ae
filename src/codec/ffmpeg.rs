use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::codec::{ArtifactHandle, VideoCodec, ensure_parent_dir};
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::frame::pack::FrameSequence;
use crate::frame::pixel_format::PixelFormat;
use crate::recipe::rule::CodecOptions;

/// Codec that shells out to the system `ffmpeg` and `ffprobe`.
///
/// Frames are streamed as `rawvideo` on stdin and read back as `rawvideo` on stdout, so the pixel
/// format recorded in the handle is the one requested on both sides.
#[derive(Clone, Debug)]
pub struct FfmpegCodec {
    /// `ffmpeg` executable.
    pub ffmpeg: PathBuf,
    /// `ffprobe` executable.
    pub ffprobe: PathBuf,
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegCodec {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit tool locations.
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

/// Muxer name for a container extension.
fn muxer_for(container: &str) -> &str {
    match container {
        "mkv" => "matroska",
        "m4v" => "mp4",
        other => other,
    }
}

impl VideoCodec for FfmpegCodec {
    #[tracing::instrument(skip(self, frames, options, path), fields(path = %path.display()))]
    fn encode(
        &self,
        frames: &FrameSequence,
        options: &CodecOptions,
        frame_rate: u32,
        path: &Path,
    ) -> TabvidResult<ArtifactHandle> {
        if frame_rate == 0 {
            return Err(TabvidError::validation("frame rate must be non-zero"));
        }
        let geometry = frames.geometry();
        if geometry.frames == 0 || geometry.width == 0 || geometry.height == 0 {
            return Err(TabvidError::validation(
                "ffmpeg codec needs at least one non-empty frame",
            ));
        }
        ensure_parent_dir(path)?;

        let pix_fmt = geometry.pixel_format.name();
        let container = self.container(options);
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            pix_fmt,
            "-s",
            &format!("{}x{}", geometry.width, geometry.height),
            "-r",
            &frame_rate.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            options.codec(),
            "-pix_fmt",
            pix_fmt,
        ]);
        for (k, v) in options.extra_args() {
            cmd.arg(format!("-{k}")).arg(v);
        }
        cmd.args(["-f", muxer_for(&container)]).arg(path);

        tracing::debug!(codec = options.codec(), pix_fmt, %container, "spawning ffmpeg");
        let mut child = cmd.spawn().map_err(|e| {
            TabvidError::codec(format!(
                "failed to spawn {} (is it installed and on PATH?): {e}",
                self.ffmpeg.display()
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TabvidError::codec("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TabvidError::codec("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok::<_, std::io::Error>(stderr_bytes)
        });

        let write_result = frames
            .frames
            .iter()
            .try_for_each(|frame| stdin.write_all(frame));
        drop(stdin);

        let status = child
            .wait()
            .map_err(|e| TabvidError::codec(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| TabvidError::codec("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| TabvidError::codec(format!("ffmpeg stderr read failed: {e}")))?;

        if !status.success() {
            let _ = std::fs::remove_file(path);
            return Err(TabvidError::codec(format!(
                "ffmpeg exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        // A broken pipe with a clean exit still means frames went missing.
        if let Err(e) = write_result {
            let _ = std::fs::remove_file(path);
            return Err(TabvidError::codec(format!(
                "failed to write frames to ffmpeg stdin: {e}"
            )));
        }

        Ok(ArtifactHandle {
            path: path.to_path_buf(),
            geometry,
        })
    }

    #[tracing::instrument(skip(self, artifact), fields(path = %artifact.path.display()))]
    fn decode(&self, artifact: &ArtifactHandle) -> TabvidResult<FrameSequence> {
        let out = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(&artifact.path)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                artifact.geometry.pixel_format.name(),
                "pipe:1",
            ])
            .output()
            .map_err(|e| TabvidError::codec(format!("failed to run ffmpeg for decode: {e}")))?;
        if !out.status.success() {
            return Err(TabvidError::codec(format!(
                "ffmpeg decode failed for '{}': {}",
                artifact.path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        FrameSequence::from_raw(artifact.geometry, &out.stdout)
    }

    fn probe_pixel_format(&self, artifact: &ArtifactHandle) -> TabvidResult<String> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            pix_fmt: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
        }

        let out = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(&artifact.path)
            .output()
            .map_err(|e| TabvidError::codec(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(TabvidError::codec(format!(
                "ffprobe failed for '{}': {}",
                artifact.path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| TabvidError::codec(format!("ffprobe json parse failed: {e}")))?;
        parsed
            .streams
            .into_iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| TabvidError::codec("no video stream found"))?
            .pix_fmt
            .ok_or_else(|| TabvidError::codec("missing pix_fmt from ffprobe"))
    }

    fn is_lossless(&self, options: &CodecOptions, pixel_format: PixelFormat) -> bool {
        options.codec() == "ffv1" && pixel_format.is_planar()
    }

    fn container(&self, options: &CodecOptions) -> String {
        match options.container() {
            Some(c) => c.to_string(),
            None if options.codec() == "libx264" => "mp4".to_string(),
            None => "mkv".to_string(),
        }
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg")
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn is_ffmpeg_toolchain_on_path() -> bool {
    tool_runs("ffmpeg") && tool_runs("ffprobe")
}

fn tool_runs(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/codec/ffmpeg.rs"]
mod tests;
