/// Convenience result type used across tabvid.
pub type TabvidResult<T> = Result<T, TabvidError>;

/// Top-level error taxonomy used by the encode/decode pipeline.
///
/// Every variant except [`TabvidError::Other`] carries a human-readable message. Errors are raised
/// at the rule level; the batch encoder collects them per rule instead of aborting.
#[derive(thiserror::Error, Debug)]
pub enum TabvidError {
    /// A declared shape disagrees with the selected columns, the table rows or decoded frames.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The codec did not honor the pixel format requested for a lossless artifact.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// Source values fall outside the declared value range beyond tolerance.
    #[error("range violation: {0}")]
    RangeViolation(String),

    /// Requested or stored component count is inconsistent with the channel count.
    #[error("reduction dimension error: {0}")]
    ReductionDimension(String),

    /// Sidecar format version is missing or not understood by this build.
    #[error("metadata version error: {0}")]
    MetadataVersion(String),

    /// Invalid user-provided configuration or data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failures spawning, feeding or reading the external codec process.
    #[error("codec error: {0}")]
    Codec(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TabvidError {
    /// Build a [`TabvidError::ShapeMismatch`] value.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Build a [`TabvidError::UnsupportedPixelFormat`] value.
    pub fn unsupported_pixel_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedPixelFormat(msg.into())
    }

    /// Build a [`TabvidError::RangeViolation`] value.
    pub fn range_violation(msg: impl Into<String>) -> Self {
        Self::RangeViolation(msg.into())
    }

    /// Build a [`TabvidError::ReductionDimension`] value.
    pub fn reduction_dimension(msg: impl Into<String>) -> Self {
        Self::ReductionDimension(msg.into())
    }

    /// Build a [`TabvidError::MetadataVersion`] value.
    pub fn metadata_version(msg: impl Into<String>) -> Self {
        Self::MetadataVersion(msg.into())
    }

    /// Build a [`TabvidError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TabvidError::Codec`] value.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Build a [`TabvidError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Errors that must never yield a partially reconstructed dataset.
    pub fn is_fatal_on_decode(&self) -> bool {
        matches!(self, Self::MetadataVersion(_) | Self::ShapeMismatch(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
