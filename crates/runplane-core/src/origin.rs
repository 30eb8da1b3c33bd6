//! Where and how a run gets executed.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Descriptor of where to execute a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Spawn a fresh OS process from this executable.
    LocalExecutable { path: PathBuf },

    /// Ask a persistent worker service to execute the run.
    WorkerServiceAddress { host: String, port: u16 },
}

impl Origin {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocalExecutable { .. } => "local_executable",
            Self::WorkerServiceAddress { .. } => "worker_service_address",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalExecutable { path } => write!(f, "{}", path.display()),
            Self::WorkerServiceAddress { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}
