//! tabvid stores columnar numeric datasets as video.
//!
//! A [`Recipe`] names groups of table columns and how each group becomes a video:
//!
//! - the selected columns are reshaped to `(frames, ...spatial..., channels)` (one row per frame)
//! - values are quantized to 8 or 16 bit pixels, optionally after reducing the channel axis with PCA
//! - frames are packed in an `ffmpeg` pixel format and handed to a [`VideoCodec`]
//! - a JSON [`Sidecar`] records everything needed to invert the transform
//!
//! [`decode_dataset`] reads the sidecar first and reverses every step. On the lossless path
//! (`ffv1` with a planar pixel format) integer data round-trips exactly and real data stays within
//! one quantization step.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Video codec backends.
pub mod codec;
pub(crate) mod frame;
pub(crate) mod meta;
pub(crate) mod pipeline;
pub(crate) mod quantize;
pub(crate) mod recipe;
pub(crate) mod reduce;
/// Tabular input and output.
pub mod table;

pub use crate::foundation::core::{Array, DType, Shape};
pub use crate::foundation::error::{TabvidError, TabvidResult};

pub use crate::codec::ffmpeg::{FfmpegCodec, is_ffmpeg_on_path, is_ffmpeg_toolchain_on_path};
pub use crate::codec::raw::RawFileCodec;
pub use crate::codec::{ArtifactHandle, VideoCodec};
pub use crate::frame::pack::{FrameGeometry, FrameSequence, pack, unpack};
pub use crate::frame::pixel_format::PixelFormat;
pub use crate::meta::sidecar::{
    FORMAT_VERSION, Sidecar, deserialize_sidecar, job_dir, read_sidecar, serialize_sidecar,
    sidecar_path, write_sidecar,
};
pub use crate::pipeline::decode::{decode_dataset, decode_job, decode_with_sidecar, list_artifacts};
pub use crate::pipeline::encode::{EncodeOptions, encode_dataset, encode_rule};
pub use crate::pipeline::report::{EncodeReport, RuleSummary, RuleWarning};
pub use crate::quantize::normalize::{
    BitDepth, NormalizationParams, ValueRange, denormalize, normalize, normalize_verbatim,
};
pub use crate::recipe::generate::{GeneratorOptions, generate};
pub use crate::recipe::rule::{CodecOptions, ConversionRule, DEFAULT_CODEC, NanFill, Recipe};
pub use crate::reduce::pca::{ReductionParams, reduce, restore};
pub use crate::table::{Column, Table};
