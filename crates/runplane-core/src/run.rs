//! The Run record as launchers see it.

use serde::{Deserialize, Serialize};

use crate::{RunId, RunStatus};

/// One execution attempt of a job.
///
/// Owned by the run store. Launchers read `id` and `job_name` and only ever
/// move `status` to [`RunStatus::Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub job_name: String,
    #[serde(default)]
    pub status: RunStatus,
}

impl Run {
    /// Create a new, not-yet-started run for the given job.
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            id: RunId::generate(),
            job_name: job_name.into(),
            status: RunStatus::NotStarted,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: RunId) -> Self {
        self.id = id;
        self
    }
}
