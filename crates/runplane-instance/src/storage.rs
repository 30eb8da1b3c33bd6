//! File-backed run documents and per-run event logs.
//!
//! Layout under the storage directory:
//!
//! ```text
//! runs/<run_id>.json     current Run document
//! events/<run_id>.jsonl  append-only EventLogEntry lines
//! ```

use std::path::{Path, PathBuf};

use runplane_core::{EngineEvent, EventId, Run, RunId};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::InstanceError;

/// One persisted entry in a run's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: EventId,
    pub run_id: RunId,
    /// Unix timestamp (milliseconds) when the entry was written.
    pub timestamp_ms: i64,
    pub kind: EventLogKind,
}

impl EventLogEntry {
    pub fn new(run_id: RunId, kind: EventLogKind) -> Self {
        Self {
            id: EventId::generate(),
            run_id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            kind,
        }
    }
}

/// What an event log entry records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventLogKind {
    /// Lifecycle or diagnostic record.
    Engine(EngineEvent),
    /// The run moved to FAILURE.
    RunFailure { message: String },
}

#[derive(Debug, Clone)]
pub(crate) struct RunStorage {
    root: PathBuf,
}

impl RunStorage {
    /// Open (creating if needed) the storage directory.
    pub(crate) async fn open(root: PathBuf) -> Result<Self, InstanceError> {
        tokio::fs::create_dir_all(root.join("runs")).await?;
        tokio::fs::create_dir_all(root.join("events")).await?;
        Ok(Self { root })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    fn run_path(&self, run_id: &RunId) -> Result<PathBuf, InstanceError> {
        let id = checked_file_stem(run_id)?;
        Ok(self.root.join("runs").join(format!("{}.json", id)))
    }

    fn log_path(&self, run_id: &RunId) -> Result<PathBuf, InstanceError> {
        let id = checked_file_stem(run_id)?;
        Ok(self.root.join("events").join(format!("{}.jsonl", id)))
    }

    pub(crate) async fn write_run(&self, run: &Run) -> Result<(), InstanceError> {
        let path = self.run_path(&run.id)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(run)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub(crate) async fn read_run(&self, run_id: &RunId) -> Result<Option<Run>, InstanceError> {
        match tokio::fs::read(self.run_path(run_id)?).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn append(&self, entry: &EventLogEntry) -> Result<(), InstanceError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(&entry.run_id)?)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    pub(crate) async fn read_log(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<EventLogEntry>, InstanceError> {
        let raw = match tokio::fs::read_to_string(self.log_path(run_id)?).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(InstanceError::from))
            .collect()
    }
}

/// Run ids become file names, so they must stay inside their directory.
fn checked_file_stem(run_id: &RunId) -> Result<&str, InstanceError> {
    let id = run_id.as_str();
    if id.is_empty() || id.contains(['/', '\\', '\0']) || id.contains("..") {
        return Err(InstanceError::InvalidRunId(run_id.clone()));
    }
    Ok(id)
}
