use super::*;
use crate::quantize::normalize::BitDepth;

fn sample(reduced: bool) -> Sidecar {
    let columns: Vec<String> = (0..6).map(|i| format!("v{i}")).collect();
    let shape = Shape::new(vec![4, 2, 3]).unwrap();
    let rule = ConversionRule::new(columns.clone(), shape.clone()).pca(if reduced { 2 } else { 0 });
    let reduction = reduced.then(|| ReductionParams {
        components: vec![vec![0.6, 0.8, 0.0], vec![0.0, 0.0, 1.0]],
        mean: vec![0.1, -2.5, 1.0 / 3.0],
        original_channel_count: 3,
        score_range: (-1.25, 0.1 + 0.2),
    });
    let packed_shape = shape.with_channels(if reduced { 2 } else { 3 }).unwrap();
    Sidecar {
        format_version: FORMAT_VERSION,
        name: "sensors".to_string(),
        rule,
        normalization: NormalizationParams {
            min: -0.1,
            max: 1.0 / 7.0,
            bit_depth: BitDepth::Eight,
            scaled: true,
        },
        reduction,
        dtype: DType::Float32,
        original_shape: shape,
        packed_shape,
        columns,
        pixel_format: if reduced {
            PixelFormat::Ya8
        } else {
            PixelFormat::Gbrp
        },
        actual_pixel_format: Some("gbrp".to_string()),
        container: "mkv".to_string(),
        frame_rate: 30,
    }
}

#[test]
fn round_trip_is_identity() {
    for reduced in [false, true] {
        let s = sample(reduced);
        let bytes = serialize_sidecar(&s).unwrap();
        let back = deserialize_sidecar(&bytes).unwrap();
        assert_eq!(back, s);
        // Floats survive bit-for-bit.
        assert_eq!(back.normalization.max.to_bits(), (1.0f64 / 7.0).to_bits());
    }
}

#[test]
fn unknown_version_is_rejected_first() {
    let mut v: serde_json::Value = serde_json::from_slice(&sample(false).to_bytes().unwrap()).unwrap();
    v["format_version"] = serde_json::json!(2);
    // Other fields are garbage too; the version must be reported, not a parse error.
    v["rule"] = serde_json::json!("not a rule");
    let bytes = serde_json::to_vec(&v).unwrap();
    assert!(matches!(
        Sidecar::from_bytes(&bytes),
        Err(TabvidError::MetadataVersion(_))
    ));
}

#[test]
fn missing_version_is_rejected() {
    let mut v: serde_json::Value = serde_json::from_slice(&sample(false).to_bytes().unwrap()).unwrap();
    v.as_object_mut().unwrap().remove("format_version");
    let bytes = serde_json::to_vec(&v).unwrap();
    assert!(matches!(
        Sidecar::from_bytes(&bytes),
        Err(TabvidError::MetadataVersion(_))
    ));

    let stringly = br#"{"format_version": "1"}"#;
    assert!(matches!(
        Sidecar::from_bytes(stringly),
        Err(TabvidError::MetadataVersion(_))
    ));
}

#[test]
fn inconsistent_records_are_rejected() {
    let mut s = sample(false);
    s.columns.pop();
    let bytes = serde_json::to_vec(&s).unwrap();
    assert!(matches!(
        Sidecar::from_bytes(&bytes),
        Err(TabvidError::ShapeMismatch(_))
    ));

    let mut s = sample(true);
    s.pixel_format = PixelFormat::Gbrp;
    assert!(s.check_consistency().is_err());

    let mut s = sample(false);
    s.packed_shape = Shape::new(vec![4, 6, 1]).unwrap();
    assert!(s.check_consistency().is_err());
}

#[test]
fn geometry_follows_packed_shape() {
    let g = sample(true).geometry();
    assert_eq!((g.frames, g.width, g.height), (4, 2, 1));
    assert_eq!(g.pixel_format, PixelFormat::Ya8);
    assert_eq!(sample(true).video_file_name(), "sensors.mkv");
}

#[test]
fn write_then_read_from_disk() {
    let dir = std::env::temp_dir().join(format!("tabvid_sidecar_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = sidecar_path(&dir, "job", "sensors");
    assert!(path.ends_with("job/sensors.json"));
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let s = sample(true);
    write_sidecar(&path, &s).unwrap();
    assert_eq!(read_sidecar(&path).unwrap(), s);
    let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_shapes_fail_to_parse() {
    for field in ["original_shape", "packed_shape"] {
        let mut v: serde_json::Value =
            serde_json::from_slice(&sample(false).to_bytes().unwrap()).unwrap();
        v[field] = serde_json::json!([]);
        let bytes = serde_json::to_vec(&v).unwrap();
        assert!(
            matches!(Sidecar::from_bytes(&bytes), Err(TabvidError::Serde(_))),
            "{field}"
        );
    }

    let mut v: serde_json::Value =
        serde_json::from_slice(&sample(false).to_bytes().unwrap()).unwrap();
    v["rule"]["shape"] = serde_json::json!([4]);
    let bytes = serde_json::to_vec(&v).unwrap();
    assert!(matches!(
        deserialize_sidecar(&bytes),
        Err(TabvidError::Serde(_))
    ));
}
