//! Error types for the sitewatch state stores.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing job state.
///
/// Unparsable records and history lines are not errors: they are skipped.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("job not found: {0}")]
    NotFound(String),
}

/// Build a closure that wraps an `io::Error` with the path it happened on.
pub(crate) fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> StateError + '_ {
    move |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}
