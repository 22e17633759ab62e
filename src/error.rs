//! Error types for the edgequake-docconv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the request cannot produce a result at all
//!   (unsupported format, wrong password, every strategy exhausted). Returned
//!   as `Err(ConvertError)` from [`crate::Converter::convert`].
//!
//! * [`AttemptError`] — **Non-fatal**: a single strategy in a chain failed
//!   (engine missing, process crashed, no output file). The pipeline driver
//!   logs it, records it on the [`crate::ConversionAttempt`] and moves on to
//!   the next strategy. Only chain exhaustion turns it into
//!   [`ConvertError::ConversionFailed`].
//!
//! [`ToolError`] and [`LibraryError`] describe failures of the two kinds of
//! downward collaborators (subprocesses and the in-process PDF library).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docconv library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Source or target format is not supported.
    #[error("Invalid or unsupported {field}: '{value}'")]
    InvalidFormat { field: &'static str, value: String },

    /// A request option could not be parsed.
    #[error("Invalid option '{field}': {reason}")]
    InvalidOption { field: &'static str, reason: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The source is encrypted and the password is wrong or missing.
    #[error("Failed to decrypt '{file}': {reason}")]
    DecryptionFailed { file: String, reason: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Every strategy in the selected chain was tried and none produced an
    /// artifact.
    #[error("Failed to convert '{file}' to {target}: all {attempts} strategies failed.\nLast error: {last_error}")]
    ConversionFailed {
        file: String,
        target: String,
        attempts: usize,
        last_error: String,
    },

    /// An engine reported success but the expected output file is gone.
    #[error("Expected .{extension} artifact not found at '{path}'")]
    ArtifactMissing { extension: String, path: PathBuf },

    /// The caller cancelled the request.
    #[error("Conversion cancelled")]
    Cancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or populate the request workspace.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the promoted artifact into durable storage.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable classification of a [`ConvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFormat,
    InvalidOption,
    DecryptionFailed,
    ConversionFailed,
    ArtifactMissing,
    InternalToolError,
    Cancelled,
    Io,
    Internal,
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            ConvertError::InvalidOption { .. } => ErrorKind::InvalidOption,
            ConvertError::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            ConvertError::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            ConvertError::ArtifactMissing { .. } => ErrorKind::ArtifactMissing,
            ConvertError::Cancelled => ErrorKind::Cancelled,
            ConvertError::Workspace { .. } | ConvertError::OutputWriteFailed { .. } => {
                ErrorKind::Io
            }
            ConvertError::InvalidConfig(_) | ConvertError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors raised before any strategy runs: the request itself
    /// is at fault. The CLI exits with status 2 for these.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidFormat | ErrorKind::InvalidOption | ErrorKind::DecryptionFailed
        )
    }
}

/// A non-fatal failure of one strategy attempt.
///
/// Recorded on the attempt and logged; the chain continues.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// An external engine failed to run or exited abnormally.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The engine ran but no matching output appeared in the workspace.
    #[error("engine succeeded but no .{extension} artifact was found")]
    ArtifactMissing { extension: String },

    /// This strategy cannot handle the current input/target pair.
    #[error("not applicable: {0}")]
    Unsupported(String),

    /// Output was produced but contained nothing usable.
    #[error("engine produced empty output")]
    EmptyOutput,

    /// A bridging step could not produce the intermediate format.
    #[error("bridge to {format} failed: {reason}")]
    BridgeFailed { format: String, reason: String },

    /// The in-process document library failed.
    #[error("document library: {0}")]
    Library(#[from] LibraryError),

    /// Workspace file operation failed.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The request was cancelled while this attempt ran.
    #[error("cancelled")]
    Cancelled,
}

impl AttemptError {
    /// The user-facing taxonomy this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Tool(ToolError::Cancelled { .. }) | AttemptError::Cancelled => {
                ErrorKind::Cancelled
            }
            AttemptError::Tool(_) => ErrorKind::InternalToolError,
            AttemptError::ArtifactMissing { .. } | AttemptError::EmptyOutput => {
                ErrorKind::ArtifactMissing
            }
            AttemptError::Unsupported(_)
            | AttemptError::BridgeFailed { .. }
            | AttemptError::Library(_) => ErrorKind::ConversionFailed,
            AttemptError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

/// Failure of an external command-line engine.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary is not installed or not on `PATH`.
    #[error("'{program}' not found: {detail}")]
    NotFound { program: String, detail: String },

    /// The process ran and exited with a non-zero status.
    #[error("'{program}' exited with {code:?}: {stderr}")]
    Exited {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The process exceeded the configured deadline and was killed.
    #[error("'{program}' timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    /// The request was cancelled; the process was killed.
    #[error("'{program}' cancelled")]
    Cancelled { program: String },

    /// Spawning or waiting failed for another reason.
    #[error("'{program}' I/O error: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the in-process document structure library.
#[derive(Debug, Clone, Error)]
pub enum LibraryError {
    /// The library could not be loaded on this host.
    #[error("library unavailable: {0}")]
    Unavailable(String),

    /// The document is encrypted and no password was given.
    #[error("document is encrypted and requires a password")]
    PasswordRequired,

    /// A password was given but it is wrong.
    #[error("wrong password")]
    WrongPassword,

    /// Any other load/parse/save failure.
    #[error("{0}")]
    Failed(String),
}
