use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::codec::{ArtifactHandle, VideoCodec, ensure_parent_dir};
use crate::foundation::core::Array;
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::foundation::math::{mean_ignoring_nan, min_max_ignoring_nan};
use crate::frame::pack::pack;
use crate::meta::sidecar::{FORMAT_VERSION, Sidecar, job_dir, sidecar_path, write_sidecar};
use crate::pipeline::report::{EncodeReport, RuleSummary, RuleWarning};
use crate::quantize::normalize::{ValueRange, check_in_range, normalize, normalize_verbatim};
use crate::recipe::rule::{ConversionRule, NanFill, Recipe, validate_name};
use crate::reduce::pca::reduce;
use crate::table::Table;

/// Batch-level controls for [`encode_dataset`].
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Encode rules concurrently on a rayon pool.
    pub parallel: bool,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
    /// Allowed overshoot of the value range, as a fraction of its span.
    pub range_tolerance: f64,
    /// Frame rate handed to the codec.
    pub frame_rate: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            range_tolerance: 0.0,
            frame_rate: 30,
        }
    }
}

/// Encode every rule of `recipe` into `<output>/<job_id>/<name>.{video,json}`.
///
/// Batch-level misconfiguration fails the call; anything rule-specific is recorded in the report
/// and the remaining rules still run.
#[tracing::instrument(skip(table, recipe, output, codec, opts), fields(rules = recipe.len()))]
pub fn encode_dataset(
    table: &Table,
    job_id: &str,
    recipe: &Recipe,
    output: &Path,
    codec: &dyn VideoCodec,
    opts: &EncodeOptions,
) -> TabvidResult<EncodeReport> {
    validate_name(job_id)?;
    recipe.validate_names()?;
    if opts.frame_rate == 0 {
        return Err(TabvidError::validation("frame rate must be non-zero"));
    }
    if opts.threads == Some(0) {
        return Err(TabvidError::validation(
            "encode 'threads' must be >= 1 when set",
        ));
    }
    if opts.range_tolerance.is_nan() || opts.range_tolerance < 0.0 {
        return Err(TabvidError::validation(format!(
            "range tolerance must be >= 0, got {}",
            opts.range_tolerance
        )));
    }

    let rules: Vec<(&str, &ConversionRule)> = recipe.iter().collect();
    let run = |(name, rule): &(&str, &ConversionRule)| {
        let outcome = encode_rule(table, job_id, name, rule, output, codec, opts);
        if let Err(e) = &outcome {
            tracing::warn!(rule = %name, error = %e, "rule failed");
        }
        (name.to_string(), outcome)
    };

    let outcomes: BTreeMap<String, TabvidResult<RuleSummary>> =
        if opts.parallel && rules.len() > 1 {
            let pool = build_thread_pool(opts.threads)?;
            pool.install(|| rules.par_iter().map(run).collect())
        } else {
            rules.iter().map(run).collect()
        };

    Ok(EncodeReport {
        job_id: job_id.to_string(),
        outcomes,
    })
}

/// Run one rule end to end: select, reshape, normalize, reduce, pack, encode, write sidecar.
#[tracing::instrument(skip(table, rule, output, codec, opts))]
pub fn encode_rule(
    table: &Table,
    job_id: &str,
    name: &str,
    rule: &ConversionRule,
    output: &Path,
    codec: &dyn VideoCodec,
    opts: &EncodeOptions,
) -> TabvidResult<RuleSummary> {
    validate_name(name)?;
    rule.validate()?;
    if rule.shape.frames() != table.rows() {
        return Err(TabvidError::shape_mismatch(format!(
            "shape {} expects {} frames but the table has {} rows",
            rule.shape,
            rule.shape.frames(),
            table.rows()
        )));
    }
    let pixel_format = rule.pixel_format()?;

    let (mut values, dtype) = table.select_rows(&rule.columns)?;
    let mut warnings = Vec::new();
    if let Some(w) = fill_nans(&mut values, rule.nan_fill) {
        tracing::debug!(rule = %name, %w, "filled NaN cells");
        warnings.push(w);
    }
    let array = Array::new(rule.shape.clone(), values)?;

    let verbatim = if !dtype.is_float() && rule.pca_components == 0 {
        if let Some(range) = rule.value_range {
            check_in_range(array.data(), range, opts.range_tolerance)?;
        }
        normalize_verbatim(&array, rule.bit_depth)
    } else {
        None
    };
    let (pixels, normalization) = match verbatim {
        Some(v) => v,
        None => {
            let range = match rule.value_range {
                Some(r) => r,
                None => observed_range(array.data())?,
            };
            normalize(&array, range, rule.bit_depth, opts.range_tolerance)?
        }
    };
    let degenerate = if normalization.scaled {
        normalization.is_degenerate().then_some(normalization.min)
    } else {
        constant_value(array.data())
    };
    if let Some(value) = degenerate {
        tracing::warn!(rule = %name, value, "degenerate value range");
        warnings.push(RuleWarning::DegenerateRange { value });
    }

    let (pixels, reduction) = if rule.pca_components > 0 {
        let (scores, params) = reduce(&pixels.map(|p| f64::from(*p)), rule.pca_components)?;
        let params = params.ok_or_else(|| {
            TabvidError::reduction_dimension("reduction produced no parameters")
        })?;
        let score_range = ValueRange::new(params.score_range.0, params.score_range.1)?;
        let (quantized, _) = normalize(&scores, score_range, rule.bit_depth, 0.0)?;
        (quantized, Some(params))
    } else {
        (pixels, None)
    };
    let packed_shape = pixels.shape().clone();
    let frames = pack(&pixels, pixel_format)?;

    let container = codec.container(&rule.codec_options);
    let dir = job_dir(output, job_id);
    let video_path = dir.join(format!("{name}.{container}"));
    let sidecar_file = sidecar_path(output, job_id, name);
    let partial = partial_path(&video_path);
    ensure_parent_dir(&video_path)?;
    remove_if_present(&partial)?;

    let started = Instant::now();
    let handle = codec.encode(&frames, &rule.codec_options, opts.frame_rate, &partial)?;
    let lossless = codec.is_lossless(&rule.codec_options, pixel_format);
    let actual_pixel_format = if lossless {
        let actual = match codec.probe_pixel_format(&handle) {
            Ok(a) => a,
            Err(e) => {
                discard(&handle.path);
                return Err(e);
            }
        };
        if actual != pixel_format.name() {
            discard(&handle.path);
            return Err(TabvidError::unsupported_pixel_format(format!(
                "codec '{}' stored '{actual}' instead of '{pixel_format}' for '{name}'",
                rule.codec_options.codec()
            )));
        }
        Some(actual)
    } else {
        tracing::debug!(
            rule = %name,
            codec = rule.codec_options.codec(),
            "lossy path, pixel format not probed"
        );
        None
    };
    let write_time = started.elapsed();

    // A stale sidecar must never describe the replacement video.
    remove_if_present(&sidecar_file)?;
    let handle = publish(handle, &video_path)?;

    let sidecar = Sidecar {
        format_version: FORMAT_VERSION,
        name: name.to_string(),
        rule: rule.clone(),
        normalization,
        reduction,
        dtype,
        original_shape: rule.shape.clone(),
        packed_shape: packed_shape.clone(),
        columns: rule.columns.clone(),
        pixel_format,
        actual_pixel_format,
        container,
        frame_rate: opts.frame_rate,
    };
    if let Err(e) = write_sidecar(&sidecar_file, &sidecar) {
        discard(&handle.path);
        return Err(e);
    }

    let compressed_bytes = fs::metadata(&handle.path)
        .with_context(|| format!("stat artifact '{}'", handle.path.display()))?
        .len();
    let elements = rule.shape.len();
    tracing::debug!(rule = %name, compressed_bytes, ?write_time, "artifact written");

    Ok(RuleSummary {
        name: name.to_string(),
        video_path: handle.path,
        sidecar_path: sidecar_file,
        packed_shape,
        pixel_format,
        scaled: normalization.scaled,
        reduced: sidecar.reduction.is_some(),
        lossless,
        warnings,
        original_bytes: (elements * dtype.size_bytes()) as u64,
        compressed_bytes,
        elements,
        write_time,
    })
}

fn fill_nans(values: &mut [f64], policy: Option<NanFill>) -> Option<RuleWarning> {
    let policy = policy?;
    let count = values.iter().filter(|v| v.is_nan()).count();
    if count == 0 {
        return None;
    }
    let fill = match policy {
        NanFill::Value(v) => v,
        NanFill::Mean => mean_ignoring_nan(values).unwrap_or(0.0),
        NanFill::Min => min_max_ignoring_nan(values).map_or(0.0, |(lo, _)| lo),
        NanFill::Max => min_max_ignoring_nan(values).map_or(0.0, |(_, hi)| hi),
    };
    values
        .iter_mut()
        .filter(|v| v.is_nan())
        .for_each(|v| *v = fill);
    Some(RuleWarning::NanFilled { count, value: fill })
}

fn constant_value(values: &[f64]) -> Option<f64> {
    let (first, rest) = values.split_first()?;
    rest.iter().all(|v| v == first).then_some(*first)
}

fn observed_range(values: &[f64]) -> TabvidResult<ValueRange> {
    if let Some((i, v)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(TabvidError::range_violation(format!(
            "element {i} = {v} has no place in a value range"
        )));
    }
    let (min, max) = min_max_ignoring_nan(values)
        .ok_or_else(|| TabvidError::range_violation("no values to derive a range from"))?;
    ValueRange::new(min, max)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".partial");
    PathBuf::from(s)
}

fn remove_if_present(path: &Path) -> TabvidResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("remove stale file '{}'", path.display()))
            .into()),
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove rejected artifact");
    }
}

fn publish(handle: ArtifactHandle, target: &Path) -> TabvidResult<ArtifactHandle> {
    if let Err(e) = fs::rename(&handle.path, target) {
        discard(&handle.path);
        return Err(anyhow::Error::new(e)
            .context(format!("publish artifact '{}'", target.display()))
            .into());
    }
    Ok(ArtifactHandle {
        path: target.to_path_buf(),
        geometry: handle.geometry,
    })
}

fn build_thread_pool(threads: Option<usize>) -> TabvidResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(TabvidError::validation(
            "encode 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| TabvidError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/encode.rs"]
mod tests;
