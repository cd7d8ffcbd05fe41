//! Error types shared across the crate.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error variants for index construction, search, and persistence.
///
/// Errors are raised by the failing operation and propagated; nothing is
/// retried and no partial recovery (such as skipping a malformed line) is
/// attempted.
#[derive(Debug, Error)]
pub enum SieveError {
    /// A caller-supplied parameter is out of range for the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An I/O operation failed; the offending path is part of the message.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A persisted MCS or index file is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// An internal invariant was violated. Not expected to occur.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl SieveError {
    /// Attaches a path to an [`io::Error`].
    pub fn io(path: &Path, source: io::Error) -> Self {
        SieveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, SieveError>;
