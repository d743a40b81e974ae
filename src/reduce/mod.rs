//! Optional linear dimensionality reduction over the channel axis.

pub(crate) mod pca;
