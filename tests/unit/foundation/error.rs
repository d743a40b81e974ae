use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        TabvidError::shape_mismatch("x")
            .to_string()
            .contains("shape mismatch:")
    );
    assert!(
        TabvidError::unsupported_pixel_format("x")
            .to_string()
            .contains("unsupported pixel format:")
    );
    assert!(
        TabvidError::range_violation("x")
            .to_string()
            .contains("range violation:")
    );
    assert!(
        TabvidError::reduction_dimension("x")
            .to_string()
            .contains("reduction dimension error:")
    );
    assert!(
        TabvidError::metadata_version("x")
            .to_string()
            .contains("metadata version error:")
    );
    assert!(TabvidError::codec("x").to_string().contains("codec error:"));
    assert!(
        TabvidError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = TabvidError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn only_version_and_shape_errors_are_fatal_on_decode() {
    assert!(TabvidError::metadata_version("v9").is_fatal_on_decode());
    assert!(TabvidError::shape_mismatch("frames").is_fatal_on_decode());
    assert!(!TabvidError::range_violation("nan").is_fatal_on_decode());
    assert!(!TabvidError::codec("exit 1").is_fatal_on_decode());
}
