pub(crate) mod sidecar;
