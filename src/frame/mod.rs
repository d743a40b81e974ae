//! Array <-> raw frame layout.

pub(crate) mod pack;
pub(crate) mod pixel_format;
