//! Error types for the edgequake-doc2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the batch cannot start at all (source root
//!   missing, destination root not creatable, invalid configuration).
//!   Returned as `Err(BatchError)` from [`crate::batch::run_batch`] before any
//!   item is touched.
//!
//! * [`ItemError`] — **Non-fatal**: a single file failed (converter crashed,
//!   destination not writable) but every other file is fine. Stored inside
//!   [`crate::output::ProcessingOutcome::Failed`] so callers can inspect
//!   partial success rather than losing the whole batch to one bad file.
//!
//! [`ConversionError`] is what an external converter reports; the item
//! processor wraps it into [`ItemError::Conversion`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2md library.
///
/// Item-level failures use [`ItemError`] and are stored in
/// [`crate::output::ProcessingOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Root errors ───────────────────────────────────────────────────────
    /// Source root does not exist.
    #[error("Source directory not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// Source root exists but is a file.
    #[error("Source path is not a directory: '{path}'")]
    SourceNotADirectory { path: PathBuf },

    /// Destination root could not be created.
    #[error("Cannot create destination directory '{path}': {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the source tree failed part-way (unreadable directory etc.).
    #[error("Failed to enumerate '{path}': {detail}")]
    Walk { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single work item.
///
/// Cloneable and serialisable so it can live inside a
/// [`crate::output::BatchReport`] and be emitted as JSON.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The item is not under the declared source root.
    #[error("'{path}' is not inside source root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The item's output would overwrite, or sit inside, another item's output.
    #[error("Destination '{path}' overlaps the output of '{owner}'")]
    DestinationConflict { path: PathBuf, owner: PathBuf },

    /// No transform registered for this file type.
    #[error("No converter found for '{discriminator}'")]
    NotFound { discriminator: String },

    /// The converter ran and failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Reading the source or writing the destination failed.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },

    /// The worker processing this item panicked.
    #[error("Worker panicked: {0}")]
    Panicked(String),
}

impl ItemError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ItemError::Io {
            path: path.into(),
            detail: source.to_string(),
        }
    }
}

/// Failure reported by a [`crate::pipeline::registry::Transform`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionError {
    /// The external program is not installed or not on `PATH`.
    #[error("Command not found: {program}")]
    ToolNotFound { program: String },

    /// The external program exited unsuccessfully.
    #[error("Command failed: {program} ({status})\n{stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// I/O failure inside the transform itself.
    #[error("Conversion I/O error: {0}")]
    Io(String),

    /// Any other converter-specific failure.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for ConversionError {
    fn from(e: std::io::Error) -> Self {
        ConversionError::Io(e.to_string())
    }
}
