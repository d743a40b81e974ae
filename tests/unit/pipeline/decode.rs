use super::*;
use crate::codec::raw::RawFileCodec;
use crate::foundation::core::{DType, Shape};
use crate::pipeline::encode::{EncodeOptions, encode_rule};
use crate::recipe::rule::ConversionRule;
use crate::table::Column;

fn scratch(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("tabvid_decode_{tag}_{}", std::process::id()))
}

fn encode_one(out: &Path, name: &str) {
    let table = Table::new(vec![
        Column::new("p", DType::UInt8, vec![0.0, 17.0, 255.0]),
        Column::new("q", DType::UInt8, vec![3.0, 4.0, 5.0]),
    ])
    .unwrap();
    let rule = ConversionRule::new(
        vec!["p".into(), "q".into()],
        Shape::new(vec![3, 2, 1]).unwrap(),
    );
    encode_rule(
        &table,
        "job",
        name,
        &rule,
        out,
        &RawFileCodec::new(),
        &EncodeOptions::default(),
    )
    .unwrap();
}

#[test]
fn verbatim_integers_round_trip_exactly() {
    let out = scratch("exact");
    encode_one(&out, "ints");
    let t = decode_dataset(&out, "job", "ints", &RawFileCodec::new()).unwrap();
    assert_eq!(t.column("p").unwrap().values, vec![0.0, 17.0, 255.0]);
    assert_eq!(t.column("q").unwrap().dtype, DType::UInt8);
    let _ = fs::remove_dir_all(&out);
}

#[test]
fn listing_sees_only_sidecars() {
    let out = scratch("list");
    encode_one(&out, "b");
    encode_one(&out, "a");
    fs::write(job_dir(&out, "job").join("notes.txt"), b"x").unwrap();
    assert_eq!(list_artifacts(&out, "job").unwrap(), vec!["a", "b"]);
    let _ = fs::remove_dir_all(&out);
}

#[test]
fn missing_video_is_reported() {
    let out = scratch("missing");
    encode_one(&out, "gone");
    fs::remove_file(job_dir(&out, "job").join("gone.raw")).unwrap();
    assert!(matches!(
        decode_dataset(&out, "job", "gone", &RawFileCodec::new()),
        Err(TabvidError::Validation(_))
    ));
    let _ = fs::remove_dir_all(&out);
}

#[test]
fn truncated_video_is_a_shape_mismatch() {
    let out = scratch("trunc");
    encode_one(&out, "cut");
    let video = job_dir(&out, "job").join("cut.raw");
    let bytes = fs::read(&video).unwrap();
    fs::write(&video, &bytes[..bytes.len() - 2]).unwrap();
    let err = decode_dataset(&out, "job", "cut", &RawFileCodec::new()).unwrap_err();
    assert!(err.is_fatal_on_decode());
    let _ = fs::remove_dir_all(&out);
}

#[test]
fn decode_job_collects_each_array() {
    let out = scratch("job");
    encode_one(&out, "one");
    encode_one(&out, "two");
    fs::write(sidecar_path(&out, "job", "broken"), b"{}").unwrap();
    let all = decode_job(&out, "job", &RawFileCodec::new()).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all["one"].is_ok() && all["two"].is_ok());
    assert!(matches!(all["broken"], Err(TabvidError::MetadataVersion(_))));
    let _ = fs::remove_dir_all(&out);
}
