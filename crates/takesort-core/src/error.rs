use std::path::PathBuf;

use thiserror::Error;

/// Failures the import pipeline distinguishes by consequence: batch
/// preconditions abort the run, everything else is reported per file
/// and the batch continues.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The source root is missing or unreadable. Nothing can be imported.
    #[error("source directory unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sidecar was found but its contents could not be understood.
    /// The file still imports through the remaining date sources.
    #[error("sidecar metadata unreadable: {}: {detail}", path.display())]
    MetadataParseFailure { path: PathBuf, detail: String },

    /// No collision-free destination name could be established.
    /// The source file is left where it is for manual review.
    #[error("destination conflict for {}: {attempts} candidate name(s) occupied by different content", path.display())]
    PlacementConflict { path: PathBuf, attempts: u32 },

    /// The import index could not be persisted. Moves already made are
    /// still on disk and a later reindex recovers the mapping.
    #[error("index write failed: {detail}")]
    IndexWriteFailure { detail: String },

    /// The operation was cancelled from outside, usually Ctrl-C.
    #[error("operation cancelled")]
    Cancelled,
}
