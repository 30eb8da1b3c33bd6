//! Launch a run in a freshly spawned worker process.

use std::ffi::OsString;
use std::time::Duration;

use runplane_core::{Event, ExecutionRequest, Origin, Run};
use runplane_instance::Instance;
use runplane_ipc::{
    open_ipc_subprocess, write_request, EventStreamReader, IpcError, ProcessHandle, ReadOptions,
};
use tracing::{debug, info, warn};

use crate::error::LaunchError;
use crate::report::{record_launch_failure, start_event};

/// Arguments placed before the request and event file paths on the worker's
/// command line.
pub const EXECUTE_RUN_ARGS: [&str; 2] = ["api", "execute-run"];

/// A worker process that finished loading its request.
///
/// From here on the caller owns the child: it should drain `events` and
/// wait on, terminate or kill `process`.
pub struct LaunchedRun {
    pub process: ProcessHandle,
    /// The rest of the worker's event stream, positioned after the load
    /// handshake. Owns the scratch directory holding the event file.
    pub events: EventStreamReader,
}

/// Launches runs whose origin is a [`Origin::LocalExecutable`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use runplane_core::{Origin, Run};
/// use runplane_instance::Instance;
/// use runplane_launcher::SubprocessLauncher;
///
/// async fn run(instance: &Instance, origin: &Origin, run: &Run) -> Result<(), Box<dyn std::error::Error>> {
///     let launcher = SubprocessLauncher::new().with_handshake_timeout(Duration::from_secs(30));
///     let mut launched = launcher.launch(instance, origin, run).await?;
///
///     while let Some(event) = launched.events.next_event().await? {
///         println!("{:?}", event);
///     }
///     launched.process.wait().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SubprocessLauncher {
    read_options: ReadOptions,
    handshake_timeout: Duration,
}

impl SubprocessLauncher {
    pub fn new() -> Self {
        Self {
            read_options: ReadOptions::default(),
            handshake_timeout: Duration::from_secs(60),
        }
    }

    /// Set how often the event file is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.read_options.poll_interval = interval;
        self
    }

    /// Set how long to wait for the worker to create its event file.
    pub fn with_appear_timeout(mut self, timeout: Duration) -> Self {
        self.read_options.appear_timeout = timeout;
        self
    }

    /// Set how long to wait for the load handshake.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Spawn a worker for `run` and wait until it has loaded the request.
    ///
    /// Spawns exactly one process and records exactly one engine event on
    /// success. If anything fails after the spawn the child is killed, the
    /// failure is recorded and the run is marked failed.
    pub async fn launch(
        &self,
        instance: &Instance,
        origin: &Origin,
        run: &Run,
    ) -> Result<LaunchedRun, LaunchError> {
        let Origin::LocalExecutable { path } = origin else {
            return Err(LaunchError::InvalidOrigin {
                expected: "local_executable",
                found: origin.kind(),
            });
        };

        if instance.get_run(&run.id).await?.is_none() {
            return Err(LaunchError::RunNotFound(run.id.clone()));
        }

        let scratch = tempfile::Builder::new()
            .prefix("runplane-run-")
            .tempdir()
            .map_err(IpcError::from)?;
        let input_path = scratch.path().join("input.json");
        let output_path = scratch.path().join("events.jsonl");

        let request = ExecutionRequest::new(origin.clone(), run.id.clone(), instance.reference());
        write_request(&input_path, &request)?;

        instance.report_engine_event(run, start_event(run)).await?;

        info!(
            run_id = %run.id,
            job = %run.job_name,
            executable = %path.display(),
            "Starting worker process"
        );

        let mut args: Vec<OsString> = EXECUTE_RUN_ARGS.iter().map(OsString::from).collect();
        args.push(input_path.clone().into_os_string());
        args.push(output_path.clone().into_os_string());

        let process = match open_ipc_subprocess(path, &args) {
            Ok(process) => process,
            Err(source) => {
                let error = LaunchError::Spawn {
                    program: path.clone(),
                    source,
                };
                record_launch_failure(instance, run, &error, &mut false).await;
                return Err(error);
            }
        };

        let mut events =
            EventStreamReader::open(&output_path, self.read_options.clone()).with_owner(process.clone());

        if let Err(error) = self.handshake(&mut events).await {
            warn!(run_id = %run.id, pid = ?process.pid(), error = %error, "Worker failed to load");
            if let Err(e) = process.kill() {
                warn!(run_id = %run.id, error = %e, "Failed to kill worker after failed handshake");
            }
            record_launch_failure(instance, run, &error, &mut false).await;
            return Err(error);
        }

        if let Err(e) = tokio::fs::remove_file(&input_path).await {
            debug!(path = %input_path.display(), error = %e, "Could not remove request file");
        }

        info!(run_id = %run.id, pid = ?process.pid(), "Worker process loaded");

        Ok(LaunchedRun {
            process,
            events: events.with_scratch_dir(scratch),
        })
    }

    /// The first event must be the load sentinel.
    async fn handshake(&self, events: &mut EventStreamReader) -> Result<(), LaunchError> {
        let first = tokio::time::timeout(self.handshake_timeout, events.next_event())
            .await
            .map_err(|_| LaunchError::HandshakeTimeout(self.handshake_timeout))??;

        match first {
            Some(Event::LoadComplete) => Ok(()),
            Some(other) => Err(LaunchError::ProtocolViolation(format!(
                "expected load_complete as the first event, got {}",
                other.kind()
            ))),
            None => Err(LaunchError::ProtocolViolation(
                "event stream ended before load_complete".to_string(),
            )),
        }
    }
}

impl Default for SubprocessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use runplane_core::{RunStatus, SUBPROCESS_INIT_MARKER};
    use runplane_instance::EventLogKind;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable worker script. `$3` is the request file, `$4` the
    /// event file.
    fn worker_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("worker.sh");
        std::fs::write(&path, format!("#!/bin/sh\nout=\"$4\"\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn emit(record: &str) -> String {
        format!("printf '%s\\n' '{}' >> \"$out\"", record)
    }

    fn launcher() -> SubprocessLauncher {
        SubprocessLauncher::new()
            .with_poll_interval(Duration::from_millis(10))
            .with_appear_timeout(Duration::from_secs(5))
            .with_handshake_timeout(Duration::from_secs(5))
    }

    async fn setup(dir: &Path) -> (Instance, Run) {
        let instance = Instance::from_config(dir.join("home")).await.unwrap();
        let run = Run::new("math");
        instance.add_run(&run).await.unwrap();
        (instance, run)
    }

    #[tokio::test]
    async fn test_launch_returns_handle_after_load_complete() {
        let dir = tempfile::tempdir().unwrap();
        let (instance, run) = setup(dir.path()).await;
        let script = worker_script(
            dir.path(),
            &[
                "cp \"$3\" \"$(dirname \"$0\")/seen-request.json\"".to_string(),
                emit(r#"{"type":"load_complete"}"#),
                emit(r#"{"type":"step_output","step":"add_one"}"#),
                emit(r#"{"type":"stream_end"}"#),
            ]
            .join("\n"),
        );
        let origin = Origin::LocalExecutable { path: script };

        let mut launched = launcher().launch(&instance, &origin, &run).await.unwrap();

        let scratch = launched.events.path().parent().unwrap().to_path_buf();
        assert!(!scratch.join("input.json").exists());

        let mut rest = Vec::new();
        while let Some(event) = launched.events.next_event().await.unwrap() {
            rest.push(event);
        }
        assert_eq!(
            rest,
            vec![Event::Opaque(json!({"type": "step_output", "step": "add_one"}))]
        );
        assert!(launched.process.wait().await.unwrap().success());

        let seen = runplane_ipc::read_request(&dir.path().join("seen-request.json")).unwrap();
        assert_eq!(seen.run_id, run.id);
        assert_eq!(seen.origin, origin);
        assert_eq!(seen.instance_ref, instance.reference());

        let log = instance.events_for_run(&run.id).await.unwrap();
        assert_eq!(log.len(), 1);
        match &log[0].kind {
            EventLogKind::Engine(event) => {
                assert_eq!(event.marker_start.as_deref(), Some(SUBPROCESS_INIT_MARKER));
                assert!(event.message.contains("About to start process"));
            }
            other => panic!("Expected engine event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sentinel_not_first_is_protocol_violation() {
        let dir = tempfile::tempdir().unwrap();
        let (instance, run) = setup(dir.path()).await;
        let script = worker_script(
            dir.path(),
            &[
                emit(r#"{"type":"engine_event","message":"a"}"#),
                emit(r#"{"type":"load_complete"}"#),
                "exec sleep 30".to_string(),
            ]
            .join("\n"),
        );
        let origin = Origin::LocalExecutable { path: script };

        let result = launcher().launch(&instance, &origin, &run).await;
        assert!(matches!(result, Err(LaunchError::ProtocolViolation(_))));

        let stored = instance.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failure);

        let log = instance.events_for_run(&run.id).await.unwrap();
        let failures = log
            .iter()
            .filter(|e| matches!(e.kind, EventLogKind::RunFailure { .. }))
            .count();
        assert_eq!(failures, 1);
        assert!(log.iter().any(|e| matches!(
            &e.kind,
            EventLogKind::Engine(ev) if ev.marker_end.as_deref() == Some(SUBPROCESS_INIT_MARKER)
        )));
    }

    #[tokio::test]
    async fn test_worker_exiting_silently_fails_launch() {
        let dir = tempfile::tempdir().unwrap();
        let (instance, run) = setup(dir.path()).await;
        let origin = Origin::LocalExecutable {
            path: worker_script(dir.path(), "exit 1"),
        };

        let result = launcher().launch(&instance, &origin, &run).await;
        assert!(matches!(
            result,
            Err(LaunchError::Channel(IpcError::NotFound { .. }))
        ));
        let stored = instance.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failure);
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let (instance, run) = setup(dir.path()).await;
        let origin = Origin::LocalExecutable {
            path: dir.path().join("no-such-worker"),
        };

        let result = launcher().launch(&instance, &origin, &run).await;
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
        let stored = instance.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failure);
    }

    #[tokio::test]
    async fn test_rejects_worker_service_origin() {
        let dir = tempfile::tempdir().unwrap();
        let (instance, run) = setup(dir.path()).await;
        let origin = Origin::WorkerServiceAddress {
            host: "localhost".to_string(),
            port: 4266,
        };

        let result = launcher().launch(&instance, &origin, &run).await;
        assert!(matches!(result, Err(LaunchError::InvalidOrigin { .. })));
        assert!(instance.events_for_run(&run.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run_is_rejected_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let (instance, _) = setup(dir.path()).await;
        let origin = Origin::LocalExecutable {
            path: worker_script(dir.path(), "touch \"$(dirname \"$0\")/spawned\""),
        };

        let result = launcher().launch(&instance, &origin, &Run::new("ghost")).await;
        assert!(matches!(result, Err(LaunchError::RunNotFound(_))));
        assert!(!dir.path().join("spawned").exists());
    }
}
