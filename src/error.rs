//! The one `Result`-shaped failure mode: an internal invariant violation.
//!
//! Everything else (malformed markup, unresolved slots, CSS parse failures)
//! is recorded as a [`crate::source::Diagnostic`] and compilation continues
//! with best-effort output, per spec.md §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("reference index {index} out of range for figure with {len} references")]
    ReferenceOutOfRange { index: u32, len: u32 },

    #[error("spot emission produced empty output unexpectedly for {spot}")]
    EmptySpotOutput { spot: &'static str },

    #[error("duplicate spot id {id} registered in the same figure")]
    DuplicateSpotId { id: u32 },

    #[error("script parse failure in {file}: {message}")]
    ScriptParse { file: String, message: String },
}
