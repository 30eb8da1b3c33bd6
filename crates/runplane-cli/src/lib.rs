//! runplane command line
//!
//! `runplane start` launches the web server and the scheduling daemon as
//! sibling processes, restarts nothing, and tears both down when either one
//! dies or the command is interrupted.

pub mod cli;
mod components;
mod error;
mod home;
pub mod logging;
mod start;
mod supervisor;
mod target;

pub use components::{ComponentLocator, API_COMPONENT, DAEMON_COMPONENT};
pub use error::SupervisorError;
pub use home::{resolve_storage_home, StorageHome, HOME_ENV};
pub use start::{start, StartContext};
pub use supervisor::{
    RunningServices, ServiceSpec, ShutdownOutcome, ShutdownReport, Supervisor, SupervisorConfig,
};
pub use target::{WorkspaceTarget, DEFAULT_WORKSPACE_FILE};
