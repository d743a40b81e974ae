//! Value <-> pixel quantization.

pub(crate) mod normalize;
