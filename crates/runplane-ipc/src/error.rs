//! Error types for the execution channel.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while reading or writing a channel file.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The event file never appeared.
    #[error("Event file '{path}' did not appear within {waited:?}")]
    NotFound { path: PathBuf, waited: Duration },

    /// A complete record could not be parsed.
    #[error("Malformed record at byte offset {offset}: {source}")]
    Deserialization {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}
