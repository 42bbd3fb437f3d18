//! Error types surfaced at the resize entry points.

use thiserror::Error;

/// Failures that can surface from a resize call.
///
/// Everything else is handled locally: a missing filter falls back to the
/// default, degenerate weight sums are clamped, and out-of-range samples are
/// clamped during post-processing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The source pixel count exceeds the supported limit.
    #[error("source image too large to process")]
    SourceTooLarge,

    /// The target canvas pixel count exceeds the supported limit.
    #[error("target image too large")]
    TargetTooLarge,
}

pub type Result<T> = std::result::Result<T, Error>;
