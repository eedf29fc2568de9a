//! Purpose: Centralize container format versioning and upgrade guidance.
//! Exports: `CONTAINER_FORMAT_VERSION`, `SUPPORTED_CONTAINER_FORMAT_VERSIONS`, `container_version_error`.
//! Role: Shared policy for gating on-disk compatibility when reading containers.
//! Invariants: Version list is additive; bump only for incompatible layout changes.
//! Invariants: The 256-byte record layout is not versioned here; it never changes.

use crate::core::error::{Error, ErrorKind};

pub const CONTAINER_FORMAT_VERSION: u32 = 1;
pub const SUPPORTED_CONTAINER_FORMAT_VERSIONS: &[u32] = &[CONTAINER_FORMAT_VERSION];

pub fn is_supported(version: u32) -> bool {
    SUPPORTED_CONTAINER_FORMAT_VERSIONS.contains(&version)
}

pub fn container_version_error(detected: u32) -> Error {
    let supported = SUPPORTED_CONTAINER_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorKind::CorruptHeader)
        .with_message(format!(
            "unsupported container format version {detected} (supported: {supported})"
        ))
        .with_hint("Re-encode the source table with this build of pircodec.")
}
