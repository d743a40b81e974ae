use super::*;

#[test]
fn min_max_skips_nan() {
    assert_eq!(
        min_max_ignoring_nan(&[3.0, f64::NAN, -1.0, 2.0]),
        Some((-1.0, 3.0))
    );
    assert_eq!(min_max_ignoring_nan(&[f64::NAN]), None);
    assert_eq!(min_max_ignoring_nan(&[]), None);
}

#[test]
fn mean_skips_nan() {
    assert_eq!(mean_ignoring_nan(&[1.0, f64::NAN, 3.0]), Some(2.0));
    assert_eq!(mean_ignoring_nan(&[f64::NAN]), None);
}

#[test]
fn max_abs_diff_flags_length_mismatch() {
    assert_eq!(max_abs_diff(&[1.0, 2.0], &[1.5, 1.0]), 1.0);
    assert!(max_abs_diff(&[1.0], &[]).is_infinite());
}
