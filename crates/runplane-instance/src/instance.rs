//! The Instance handle.

use std::path::{Path, PathBuf};

use runplane_core::{EngineEvent, Event, InstanceRef, Run, RunId, RunStatus};
use tracing::{debug, info, warn};

use crate::config::InstanceConfig;
use crate::error::InstanceError;
use crate::storage::{EventLogEntry, EventLogKind, RunStorage};

/// Process-wide coordinator of run and event storage.
///
/// Acquire with [`Instance::from_config`] or [`Instance::from_ref`]; the
/// handle is released when dropped.
#[derive(Debug)]
pub struct Instance {
    home: PathBuf,
    storage: RunStorage,
}

impl Instance {
    /// Open the instance configured by `<home>/runplane.toml`.
    pub async fn from_config(home: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let home = home.as_ref().to_path_buf();
        let config = InstanceConfig::load(&home).await?;
        let storage = RunStorage::open(config.storage_dir(&home)).await?;

        info!(
            home = %home.display(),
            storage = %storage.root().display(),
            "Instance opened"
        );
        Ok(Self { home, storage })
    }

    /// Reconstruct an instance from a reference produced by
    /// [`Instance::reference`], possibly in another process.
    pub async fn from_ref(instance_ref: &InstanceRef) -> Result<Self, InstanceError> {
        let storage = RunStorage::open(instance_ref.storage_dir.clone()).await?;
        debug!(home = %instance_ref.home.display(), "Instance rehydrated from reference");
        Ok(Self {
            home: instance_ref.home.clone(),
            storage,
        })
    }

    /// A serializable pointer to this instance's stores.
    pub fn reference(&self) -> InstanceRef {
        InstanceRef {
            home: self.home.clone(),
            storage_dir: self.storage.root().to_path_buf(),
        }
    }

    /// Store a new run.
    pub async fn add_run(&self, run: &Run) -> Result<(), InstanceError> {
        self.storage.write_run(run).await?;
        debug!(run_id = %run.id, job = %run.job_name, "Run added");
        Ok(())
    }

    /// Look a run up by id.
    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>, InstanceError> {
        self.storage.read_run(run_id).await
    }

    /// Record an engine event against a run and hand it back so callers can
    /// forward it downstream.
    pub async fn report_engine_event(
        &self,
        run: &Run,
        event: EngineEvent,
    ) -> Result<EngineEvent, InstanceError> {
        info!(run_id = %run.id, message = %event.message, "Engine event");
        let entry = EventLogEntry::new(run.id.clone(), EventLogKind::Engine(event.clone()));
        self.storage.append(&entry).await?;
        Ok(event)
    }

    /// Move a run to FAILURE, log the transition, and return it as a
    /// channel event so callers can forward it downstream.
    pub async fn report_run_failed(&self, run: &Run) -> Result<Event, InstanceError> {
        let mut stored = self
            .get_run(&run.id)
            .await?
            .ok_or_else(|| InstanceError::RunNotFound(run.id.clone()))?;

        if stored.status.is_terminal() {
            warn!(
                run_id = %run.id,
                status = ?stored.status,
                "Marking a run failed that is already terminal"
            );
        }
        stored.status = RunStatus::Failure;
        self.storage.write_run(&stored).await?;

        let message = format!("Execution of run for \"{}\" failed.", stored.job_name);
        warn!(run_id = %run.id, "{}", message);
        self.storage
            .append(&EventLogEntry::new(
                run.id.clone(),
                EventLogKind::RunFailure {
                    message: message.clone(),
                },
            ))
            .await?;

        Ok(Event::RunFailure { message })
    }

    /// All log entries recorded for a run, oldest first.
    pub async fn events_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<EventLogEntry>, InstanceError> {
        self.storage.read_log(run_id).await
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        debug!(home = %self.home.display(), "Instance released");
    }
}
