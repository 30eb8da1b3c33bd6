//! Error types for launchers.

use std::path::PathBuf;
use std::time::Duration;

use runplane_core::RunId;
use runplane_instance::InstanceError;
use runplane_ipc::IpcError;
use thiserror::Error;

/// Errors that can occur while launching a run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The worker broke the channel protocol.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The worker process could not be started.
    #[error("Failed to spawn worker process '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to or talking with a worker service failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker did not report that it loaded in time.
    #[error("Worker did not finish loading within {0:?}")]
    HandshakeTimeout(Duration),

    /// The origin is the wrong variant for this launcher.
    #[error("Expected a {expected} origin, got {found}")]
    InvalidOrigin {
        expected: &'static str,
        found: &'static str,
    },

    /// The run is not in the run store.
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    /// Request or event (de)serialization, or channel file I/O.
    #[error(transparent)]
    Channel(#[from] IpcError),

    /// Run or event storage.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}
