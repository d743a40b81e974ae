use super::*;
use crate::codec::raw::RawFileCodec;
use crate::foundation::core::{DType, Shape};
use crate::table::Column;

fn scratch(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tabvid_encode_{tag}_{}", std::process::id()))
}

fn table() -> Table {
    Table::new(vec![
        Column::new("a", DType::Float64, vec![0.0, 1.0, 2.0, 3.0]),
        Column::new("b", DType::Float64, vec![1.0, 0.5, 0.25, 0.0]),
    ])
    .unwrap()
}

#[test]
fn nan_fill_policies() {
    let mut v = vec![1.0, f64::NAN, 3.0];
    let w = fill_nans(&mut v, Some(NanFill::Mean)).unwrap();
    assert_eq!(v, vec![1.0, 2.0, 3.0]);
    assert_eq!(w, RuleWarning::NanFilled { count: 1, value: 2.0 });

    let mut v = vec![f64::NAN, 5.0, -1.0];
    fill_nans(&mut v, Some(NanFill::Min));
    assert_eq!(v[0], -1.0);
    let mut v = vec![f64::NAN, 5.0, -1.0];
    fill_nans(&mut v, Some(NanFill::Max));
    assert_eq!(v[0], 5.0);
    let mut v = vec![f64::NAN];
    fill_nans(&mut v, Some(NanFill::Value(7.5)));
    assert_eq!(v[0], 7.5);

    let mut untouched = vec![f64::NAN];
    assert!(fill_nans(&mut untouched, None).is_none());
    assert!(untouched[0].is_nan());
    assert!(fill_nans(&mut [1.0], Some(NanFill::Mean)).is_none());
}

#[test]
fn observed_range_rejects_non_finite() {
    assert_eq!(
        observed_range(&[2.0, -1.0, 4.0]).unwrap(),
        ValueRange::new(-1.0, 4.0).unwrap()
    );
    assert!(matches!(
        observed_range(&[1.0, f64::NAN]),
        Err(TabvidError::RangeViolation(_))
    ));
    assert!(matches!(
        observed_range(&[f64::INFINITY]),
        Err(TabvidError::RangeViolation(_))
    ));
}

#[test]
fn partial_name_appends_suffix() {
    assert_eq!(
        partial_path(Path::new("/out/job/a.mkv")),
        PathBuf::from("/out/job/a.mkv.partial")
    );
}

#[test]
fn zero_threads_rejected() {
    assert!(build_thread_pool(Some(0)).is_err());
    assert!(build_thread_pool(Some(2)).is_ok());
}

#[test]
fn batch_options_are_validated() {
    let out = scratch("opts");
    let recipe = Recipe::new();
    let codec = RawFileCodec::new();
    let bad_rate = EncodeOptions {
        frame_rate: 0,
        ..EncodeOptions::default()
    };
    assert!(encode_dataset(&table(), "job", &recipe, &out, &codec, &bad_rate).is_err());
    let bad_tol = EncodeOptions {
        range_tolerance: -0.1,
        ..EncodeOptions::default()
    };
    assert!(encode_dataset(&table(), "job", &recipe, &out, &codec, &bad_tol).is_err());
    assert!(
        encode_dataset(&table(), "../x", &recipe, &out, &codec, &EncodeOptions::default())
            .is_err()
    );
}

#[test]
fn zero_threads_fail_the_batch_even_when_sequential() {
    let out = scratch("threads");
    let recipe = Recipe::new()
        .with(
            "a",
            ConversionRule::new(vec!["a".into()], Shape::new(vec![4, 1]).unwrap()),
        )
        .unwrap();
    for parallel in [false, true] {
        let opts = EncodeOptions {
            parallel,
            threads: Some(0),
            ..EncodeOptions::default()
        };
        let err =
            encode_dataset(&table(), "job", &recipe, &out, &RawFileCodec::new(), &opts).unwrap_err();
        assert!(matches!(err, TabvidError::Validation(_)));
    }
    assert!(!out.join("job").join("a.json").exists());
}

#[test]
fn json_container_is_refused_before_writing() {
    let out = scratch("json_container");
    let rule = ConversionRule::new(vec!["a".into()], Shape::new(vec![4, 1]).unwrap())
        .codec_option("container", "json");
    let err = encode_rule(
        &table(),
        "job",
        "a",
        &rule,
        &out,
        &RawFileCodec::new(),
        &EncodeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TabvidError::Validation(_)));
    assert!(!out.join("job").join("a.json").exists());
}

#[test]
fn constant_integers_stored_verbatim_still_warn() {
    let out = scratch("const_int");
    let t = Table::new(vec![Column::new("k", DType::UInt8, vec![9.0; 3])]).unwrap();
    let rule = ConversionRule::new(vec!["k".into()], Shape::new(vec![3, 1]).unwrap());
    let summary = encode_rule(
        &t,
        "job",
        "k",
        &rule,
        &out,
        &RawFileCodec::new(),
        &EncodeOptions::default(),
    )
    .unwrap();
    assert!(!summary.scaled);
    assert_eq!(
        summary.warnings,
        vec![RuleWarning::DegenerateRange { value: 9.0 }]
    );
    assert_eq!(constant_value(&[1.0, 2.0]), None);
    assert_eq!(constant_value(&[]), None);
    let _ = std::fs::remove_dir_all(&out);
}

#[test]
fn row_count_must_match_frames() {
    let out = scratch("rows");
    let rule = ConversionRule::new(
        vec!["a".into(), "b".into()],
        Shape::new(vec![3, 2, 1]).unwrap(),
    );
    let err = encode_rule(
        &table(),
        "job",
        "x",
        &rule,
        &out,
        &RawFileCodec::new(),
        &EncodeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TabvidError::ShapeMismatch(_)));
    assert!(!out.join("job").join("x.raw").exists());
}

#[test]
fn summary_reports_sizes_and_no_partial_remains() {
    let out = scratch("summary");
    let rule = ConversionRule::new(
        vec!["a".into(), "b".into()],
        Shape::new(vec![4, 2, 1]).unwrap(),
    );
    let s = encode_rule(
        &table(),
        "job",
        "x",
        &rule,
        &out,
        &RawFileCodec::new(),
        &EncodeOptions::default(),
    )
    .unwrap();
    assert_eq!(s.elements, 8);
    assert_eq!(s.original_bytes, 64);
    assert_eq!(s.compressed_bytes, 8);
    assert_eq!(s.bpppb(), Some(8.0));
    assert!(s.scaled && s.lossless && !s.reduced);
    assert!(s.video_path.ends_with("job/x.raw"));
    assert!(s.sidecar_path.is_file());
    assert!(!out.join("job").join("x.raw.partial").exists());
    let _ = fs::remove_dir_all(&out);
}
