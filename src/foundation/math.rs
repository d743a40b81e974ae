/// Observed `(min, max)` over the non-NaN values, `None` when there are none.
pub(crate) fn min_max_ignoring_nan(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Arithmetic mean over the non-NaN values, `None` when there are none.
pub(crate) fn mean_ignoring_nan(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Largest absolute elementwise difference; `f64::INFINITY` on length mismatch.
#[cfg(test)]
pub(crate) fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
