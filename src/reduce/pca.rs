use nalgebra::{DMatrix, SymmetricEigen};

use crate::foundation::core::Array;
use crate::foundation::error::{TabvidError, TabvidResult};
use crate::foundation::math::min_max_ignoring_nan;
use crate::quantize::normalize::{BitDepth, NormalizationParams};

/// Fitted projection needed to undo [`reduce`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReductionParams {
    /// Orthonormal basis vectors, one per retained component, each `original_channel_count` long.
    pub components: Vec<Vec<f64>>,
    /// Per-channel mean removed before projecting.
    pub mean: Vec<f64>,
    /// Channel count of the array before reduction.
    pub original_channel_count: usize,
    /// Observed `(min, max)` of the projected scores.
    pub score_range: (f64, f64),
}

impl ReductionParams {
    /// Number of retained components.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Map between stored score pixels and score values at `bit_depth`.
    pub fn score_normalization(&self, bit_depth: BitDepth) -> NormalizationParams {
        NormalizationParams {
            min: self.score_range.0,
            max: self.score_range.1,
            bit_depth,
            scaled: true,
        }
    }

    fn check(&self) -> TabvidResult<()> {
        if self.mean.len() != self.original_channel_count {
            return Err(TabvidError::reduction_dimension(format!(
                "stored mean has {} entries for {} channels",
                self.mean.len(),
                self.original_channel_count
            )));
        }
        if let Some(c) = self
            .components
            .iter()
            .find(|c| c.len() != self.original_channel_count)
        {
            return Err(TabvidError::reduction_dimension(format!(
                "stored component has {} coefficients for {} channels",
                c.len(),
                self.original_channel_count
            )));
        }
        if self.n_components() > self.original_channel_count {
            return Err(TabvidError::reduction_dimension(format!(
                "{} stored components exceed {} channels",
                self.n_components(),
                self.original_channel_count
            )));
        }
        Ok(())
    }
}

/// Project the channel axis of `array` onto its `n_components` leading principal components.
///
/// The array is viewed as `(samples, channels)`. `n_components == 0` is the identity and yields no
/// parameters.
#[tracing::instrument(skip(array), fields(shape = %array.shape()))]
pub fn reduce(
    array: &Array<f64>,
    n_components: usize,
) -> TabvidResult<(Array<f64>, Option<ReductionParams>)> {
    let channels = array.shape().channels();
    if n_components == 0 {
        return Ok((array.clone(), None));
    }
    check_components(n_components, channels)?;

    let samples = array.samples();
    let x = DMatrix::from_row_slice(samples, channels, array.data());
    let mean: Vec<f64> = (0..channels).map(|j| x.column(j).mean()).collect();
    let mut centered = x;
    for (j, m) in mean.iter().enumerate() {
        centered.column_mut(j).add_scalar_mut(-m);
    }

    let denom = samples.saturating_sub(1).max(1) as f64;
    let cov = (centered.transpose() * &centered) / denom;
    let eig = SymmetricEigen::new(cov);

    let mut order: Vec<usize> = (0..channels).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .total_cmp(&eig.eigenvalues[a])
            .then(a.cmp(&b))
    });

    let components: Vec<Vec<f64>> = order[..n_components]
        .iter()
        .map(|&k| {
            let mut v: Vec<f64> = eig.eigenvectors.column(k).iter().copied().collect();
            let pivot = v
                .iter()
                .copied()
                .fold(0.0f64, |acc, c| if c.abs() > acc.abs() { c } else { acc });
            if pivot < 0.0 {
                v.iter_mut().for_each(|c| *c = -*c);
            }
            v
        })
        .collect();

    let basis = DMatrix::from_fn(n_components, channels, |i, j| components[i][j]);
    let scores = &centered * basis.transpose();
    let mut out = Vec::with_capacity(samples * n_components);
    for r in 0..samples {
        out.extend(scores.row(r).iter().copied());
    }
    let score_range = min_max_ignoring_nan(&out).unwrap_or((0.0, 0.0));

    let params = ReductionParams {
        components,
        mean,
        original_channel_count: channels,
        score_range,
    };
    let reduced = Array::new(array.shape().with_channels(n_components)?, out)?;
    Ok((reduced, Some(params)))
}

/// Apply the inverse projection `scores * components + mean`.
///
/// Exact (up to floating point) when every component was retained; otherwise the variance of the
/// dropped components is lost.
pub fn restore(reduced: &Array<f64>, params: &ReductionParams) -> TabvidResult<Array<f64>> {
    params.check()?;
    let k = reduced.shape().channels();
    if k != params.n_components() {
        return Err(TabvidError::reduction_dimension(format!(
            "reduced array has {k} channels but {} components are stored",
            params.n_components()
        )));
    }

    let channels = params.original_channel_count;
    let samples = reduced.samples();
    let scores = DMatrix::from_row_slice(samples, k, reduced.data());
    let basis = DMatrix::from_fn(k, channels, |i, j| params.components[i][j]);
    let restored = scores * basis;

    let mut out = Vec::with_capacity(samples * channels);
    for r in 0..samples {
        out.extend(
            restored
                .row(r)
                .iter()
                .zip(&params.mean)
                .map(|(v, m)| v + m),
        );
    }
    Array::new(reduced.shape().with_channels(channels)?, out)
}

/// Reject component counts above the channel count before any work is done.
pub fn check_components(n_components: usize, channels: usize) -> TabvidResult<()> {
    if n_components > channels {
        return Err(TabvidError::reduction_dimension(format!(
            "requested {n_components} components but the array has only {channels} channels"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/reduce/pca.rs"]
mod tests;
