use super::*;
use crate::foundation::core::{Array, Shape};
use crate::frame::pack::pack;

fn scratch(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("tabvid_raw_{}", std::process::id()))
        .join(name)
}

fn sequence() -> FrameSequence {
    let shape = Shape::new(vec![3, 2, 2, 3]).unwrap();
    let data = (0..shape.len()).map(|i| (i * 7 % 256) as u16).collect();
    pack(&Array::new(shape, data).unwrap(), PixelFormat::Gbrp).unwrap()
}

#[test]
fn encode_then_decode_is_exact() {
    let codec = RawFileCodec::new();
    let path = scratch("exact.raw");
    let seq = sequence();
    let handle = codec
        .encode(&seq, &CodecOptions::default(), 30, &path)
        .unwrap();
    assert_eq!(handle.geometry, seq.geometry());
    assert_eq!(codec.decode(&handle).unwrap(), seq);
    assert_eq!(codec.probe_pixel_format(&handle).unwrap(), "gbrp");
    let _ = fs::remove_file(&path);
}

#[test]
fn truncated_file_is_a_shape_mismatch() {
    let codec = RawFileCodec::new();
    let path = scratch("truncated.raw");
    let handle = codec
        .encode(&sequence(), &CodecOptions::default(), 30, &path)
        .unwrap();
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
    assert!(matches!(
        codec.decode(&handle),
        Err(crate::foundation::error::TabvidError::ShapeMismatch(_))
    ));
    let _ = fs::remove_file(&path);
}

#[test]
fn substitution_is_reported_by_probe() {
    let codec = RawFileCodec::with_substituted_format(PixelFormat::Rgb24);
    let path = scratch("substituted.raw");
    let handle = codec
        .encode(&sequence(), &CodecOptions::default(), 30, &path)
        .unwrap();
    assert_eq!(codec.probe_pixel_format(&handle).unwrap(), "rgb24");
    let _ = fs::remove_file(&path);
}

#[test]
fn container_defaults_to_raw() {
    let codec = RawFileCodec::new();
    assert_eq!(codec.container(&CodecOptions::default()), "raw");
    assert_eq!(
        codec.container(&CodecOptions::new().set("container", "bin")),
        "bin"
    );
    assert!(codec.is_lossless(&CodecOptions::default(), PixelFormat::Rgb24));
}
