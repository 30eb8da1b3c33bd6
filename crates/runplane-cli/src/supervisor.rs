//! Starts, watches and stops the long-lived runplane services.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use runplane_ipc::{exit_code, open_ipc_subprocess, ProcessHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;

/// How long to wait for a killed service to be reaped.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// A service to run under supervision.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }
}

/// Supervisor timing.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often services are checked for liveness.
    pub poll_interval: Duration,
    /// How long a service gets to exit after SIGTERM before it is killed.
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

/// How a service ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// It had already exited, with this code.
    AlreadyExited(i32),
    /// It exited after being asked to, with this code.
    Terminated(i32),
    /// It outlived the shutdown timeout and was killed.
    Killed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub service: String,
    pub outcome: ShutdownOutcome,
}

impl ShutdownReport {
    /// The line printed for this service once it is down.
    pub fn summary(&self) -> String {
        match self.outcome {
            ShutdownOutcome::AlreadyExited(code) => format!(
                "{} process had already exited with code {}.",
                self.service, code
            ),
            ShutdownOutcome::Terminated(_) => format!("Shut down {} process.", self.service),
            ShutdownOutcome::Killed => format!("Killed {} process.", self.service),
        }
    }
}

/// Runs a fixed set of services until one dies or it is cancelled, then
/// shuts all of them down.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Spawn, monitor, then shut down `services`.
    ///
    /// Returns once `cancel` fires (after shutdown) or with
    /// [`SupervisorError::ProcessExitedUnexpectedly`] once any service exits
    /// on its own. The other services are shut down either way.
    pub async fn run(
        &self,
        services: Vec<ServiceSpec>,
        cancel: CancellationToken,
    ) -> Result<Vec<ShutdownReport>, SupervisorError> {
        let running = self.spawn(services).await?;
        let monitored = running.monitor(&cancel).await;
        let reports = running.shutdown().await;
        monitored.map(|()| reports)
    }

    /// Start every service in order.
    ///
    /// If one fails to start, those already started are shut down before
    /// the error is returned.
    pub async fn spawn(
        &self,
        services: Vec<ServiceSpec>,
    ) -> Result<RunningServices, SupervisorError> {
        let mut running = RunningServices {
            config: self.config.clone(),
            services: Vec::with_capacity(services.len()),
        };

        for spec in services {
            match open_ipc_subprocess(&spec.program, &spec.args) {
                Ok(handle) => {
                    info!(service = %spec.name, pid = ?handle.pid(), "Service started");
                    running.services.push(RunningService {
                        name: spec.name,
                        handle,
                    });
                }
                Err(source) => {
                    warn!(service = %spec.name, error = %source, "Service failed to start");
                    running.shutdown().await;
                    return Err(SupervisorError::Spawn {
                        service: spec.name,
                        program: spec.program,
                        source,
                    });
                }
            }
        }

        Ok(running)
    }
}

#[derive(Debug)]
struct RunningService {
    name: String,
    handle: ProcessHandle,
}

/// Services started by [`Supervisor::spawn`].
#[derive(Debug)]
pub struct RunningServices {
    config: SupervisorConfig,
    services: Vec<RunningService>,
}

impl RunningServices {
    /// Process handles by service name.
    pub fn handles(&self) -> impl Iterator<Item = (&str, &ProcessHandle)> {
        self.services
            .iter()
            .map(|service| (service.name.as_str(), &service.handle))
    }

    /// Poll every `poll_interval` until a service exits or `cancel` fires.
    ///
    /// Never returns `Ok` on its own: only cancellation ends it cleanly.
    pub async fn monitor(&self, cancel: &CancellationToken) -> Result<(), SupervisorError> {
        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Supervisor cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    for service in &self.services {
                        if let Some(status) = service.handle.try_status()? {
                            let code = exit_code(&status);
                            warn!(service = %service.name, code, "Service exited unexpectedly");
                            return Err(SupervisorError::ProcessExitedUnexpectedly {
                                service: service.name.clone(),
                                code,
                            });
                        }
                    }
                    debug!(services = self.services.len(), "All services alive");
                }
            }
        }
    }

    /// Terminate every service concurrently, killing any that outlive the
    /// shutdown timeout.
    pub async fn shutdown(&self) -> Vec<ShutdownReport> {
        if self.services.is_empty() {
            return Vec::new();
        }

        println!("Shutting down runplane services...");
        let timeout = self.config.shutdown_timeout;
        join_all(
            self.services
                .iter()
                .map(|service| shutdown_service(service, timeout)),
        )
        .await
    }
}

async fn shutdown_service(service: &RunningService, timeout: Duration) -> ShutdownReport {
    let name = service.name.as_str();
    let handle = &service.handle;

    if let Ok(Some(status)) = handle.try_status() {
        debug!(service = %name, "Service already exited");
        let report = ShutdownReport {
            service: name.to_string(),
            outcome: ShutdownOutcome::AlreadyExited(exit_code(&status)),
        };
        println!("{}", report.summary());
        return report;
    }

    if let Err(e) = handle.terminate() {
        warn!(service = %name, error = %e, "Failed to signal service");
    }

    println!("Waiting for {} process to shut down...", name);
    match handle.wait_timeout(timeout).await {
        Ok(Some(status)) => {
            let report = ShutdownReport {
                service: name.to_string(),
                outcome: ShutdownOutcome::Terminated(exit_code(&status)),
            };
            println!("{}", report.summary());
            return report;
        }
        Ok(None) => {}
        Err(e) => warn!(service = %name, error = %e, "Failed to wait for service"),
    }

    println!("{} process did not terminate cleanly, killing the process", name);
    if let Err(e) = handle.kill() {
        warn!(service = %name, error = %e, "Failed to kill service");
    }
    if let Ok(None) = handle.wait_timeout(KILL_REAP_TIMEOUT).await {
        warn!(service = %name, pid = ?handle.pid(), "Service still running after kill");
    }

    let report = ShutdownReport {
        service: name.to_string(),
        outcome: ShutdownOutcome::Killed,
    };
    println!("{}", report.summary());
    report
}
