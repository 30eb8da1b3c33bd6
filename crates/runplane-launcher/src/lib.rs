//! runplane launchers
//!
//! Two ways to execute a run:
//!
//! - [`SubprocessLauncher`] spawns the run's executable as a child process,
//!   hands it the request through a file and returns once the child reports
//!   that it loaded.
//! - [`WorkerLauncher`] sends the request to a persistent worker service
//!   through a [`WorkerClient`] (gRPC by default, see [`GrpcWorkerClient`])
//!   and streams back what the worker emits.
//!
//! Both record engine events against the run through the
//! [`Instance`](runplane_instance::Instance) and mark the run failed at most
//! once when start-up goes wrong.

mod client;
mod error;
mod report;
mod subprocess;
mod worker;

pub use client::{GrpcWorkerClient, WorkerClient, WorkerEventStream};
pub use error::LaunchError;
pub use subprocess::{LaunchedRun, SubprocessLauncher, EXECUTE_RUN_ARGS};
pub use worker::{RunEventStream, WorkerLauncher};
