//! Error types for instance storage.

use std::path::PathBuf;

use runplane_core::RunId;
use thiserror::Error;

/// Errors raised while opening or writing instance storage.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// Filesystem error.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be (de)serialized.
    #[error("Storage JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The instance config file is malformed.
    #[error("Invalid instance config '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Run id cannot be used as a storage key.
    #[error("Invalid run id: {0:?}")]
    InvalidRunId(RunId),

    /// Run is not in the store.
    #[error("Run not found: {0}")]
    RunNotFound(RunId),
}
