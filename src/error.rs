//! Error types for tree migration and single-patch operations.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Source location of a transform declaration, carried for the config layer
/// to format. This crate never renders it into a message itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Error)]
pub enum Error {
    /// A path escapes the virtual root or is not relative. Fatal at
    /// construction time, never auto-corrected.
    #[error("'{path}' is not a relative path or contains unexpected ..")]
    PathSafety { path: String },

    /// An invalid transform descriptor at config-load time.
    #[error("{message}")]
    Config { message: String, location: Location },

    /// A destination collision, non-directory parent segment, or non-empty
    /// self-aliasing target. Aborts the current transform only.
    #[error("{0}")]
    Validation(String),

    /// A missing source path escalated under strict policy.
    #[error("{0}")]
    Noop(String),

    /// An unreadable or unwritable entity. Aborts the whole call; no partial
    /// artifact is produced.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A post-apply hash mismatch. Never retried.
    #[error("hash mismatch for '{path}': expected {expected}, got {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    /// Malformed patch bytes: bad magic, unsupported version, or a record
    /// that does not decode or apply.
    #[error("invalid patch data: {0}")]
    Format(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
