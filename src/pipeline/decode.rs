use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context as _;

use crate::codec::{ArtifactHandle, VideoCodec};
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::frame::pack::unpack;
use crate::meta::sidecar::{Sidecar, job_dir, read_sidecar, sidecar_path};
use crate::quantize::normalize::denormalize;
use crate::recipe::rule::validate_name;
use crate::reduce::pca::restore;
use crate::table::Table;

/// Rebuild the columns stored under `name`, reading the sidecar before touching the video.
#[tracing::instrument(skip(output, codec))]
pub fn decode_dataset(
    output: &Path,
    job_id: &str,
    name: &str,
    codec: &dyn VideoCodec,
) -> TabvidResult<Table> {
    validate_name(job_id)?;
    validate_name(name)?;
    let sidecar = read_sidecar(&sidecar_path(output, job_id, name))?;
    if sidecar.name != name {
        return Err(TabvidError::validation(format!(
            "sidecar for '{name}' describes array '{}'",
            sidecar.name
        )));
    }
    decode_with_sidecar(&job_dir(output, job_id), &sidecar, codec)
}

/// Decode the artifact described by `sidecar`, located in `dir`.
pub fn decode_with_sidecar(
    dir: &Path,
    sidecar: &Sidecar,
    codec: &dyn VideoCodec,
) -> TabvidResult<Table> {
    let path = dir.join(sidecar.video_file_name());
    if !path.is_file() {
        return Err(TabvidError::validation(format!(
            "video artifact '{}' is missing",
            path.display()
        )));
    }
    let handle = ArtifactHandle {
        path,
        geometry: sidecar.geometry(),
    };

    let frames = codec.decode(&handle)?;
    let pixels = unpack(&frames, &sidecar.packed_shape)?;
    let values = match &sidecar.reduction {
        Some(reduction) => {
            let scores = denormalize(
                &pixels,
                &reduction.score_normalization(sidecar.normalization.bit_depth),
            );
            let restored = restore(&scores, reduction)?;
            denormalize(&restored, &sidecar.normalization)
        }
        None => denormalize(&pixels, &sidecar.normalization),
    };
    if values.shape() != &sidecar.original_shape {
        return Err(TabvidError::shape_mismatch(format!(
            "reconstructed shape {} differs from recorded {}",
            values.shape(),
            sidecar.original_shape
        )));
    }
    tracing::debug!(name = %sidecar.name, elements = values.data().len(), "decoded artifact");
    Table::from_rows(&sidecar.columns, sidecar.dtype, values.data())
}

/// Decode every array of a job; each entry carries its own outcome.
#[tracing::instrument(skip(output, codec))]
pub fn decode_job(
    output: &Path,
    job_id: &str,
    codec: &dyn VideoCodec,
) -> TabvidResult<BTreeMap<String, TabvidResult<Table>>> {
    let names = list_artifacts(output, job_id)?;
    Ok(names
        .into_iter()
        .map(|name| {
            let outcome = decode_dataset(output, job_id, &name, codec);
            if let Err(e) = &outcome {
                tracing::warn!(array = %name, error = %e, "decode failed");
            }
            (name, outcome)
        })
        .collect())
}

/// Array names with a published sidecar in the job directory, sorted.
pub fn list_artifacts(output: &Path, job_id: &str) -> TabvidResult<Vec<String>> {
    validate_name(job_id)?;
    let dir = job_dir(output, job_id);
    let entries =
        fs::read_dir(&dir).with_context(|| format!("list job directory '{}'", dir.display()))?;
    let mut names = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("list job directory '{}'", dir.display()))?
            .path();
        if path.is_file()
            && path.extension().is_some_and(|e| e == "json")
            && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/decode.rs"]
mod tests;
