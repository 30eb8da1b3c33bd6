//! Error types for the supervisor.

use std::path::PathBuf;

use runplane_core::CoreError;
use runplane_instance::InstanceError;
use thiserror::Error;

/// Errors that end a `runplane start` invocation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Bad arguments or a missing component. Nothing was spawned.
    #[error("{0}")]
    Usage(String),

    /// A supervised service died while it was being monitored.
    #[error("{service} process shut down unexpectedly with return code {code}")]
    ProcessExitedUnexpectedly { service: String, code: i32 },

    /// A service could not be started.
    #[error("Failed to start {service} ('{program}'): {source}")]
    Spawn {
        service: String,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    Serialization(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
