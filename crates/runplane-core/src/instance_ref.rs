//! Serializable pointer to an instance's persistent stores.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Everything another process needs to open the same run and event storage.
///
/// Passed across process boundaries inside an
/// [`ExecutionRequest`](crate::ExecutionRequest) and as the `--instance-ref`
/// argument of supervised services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRef {
    /// Storage home the instance was configured from.
    pub home: PathBuf,
    /// Root directory for run documents and event logs.
    pub storage_dir: PathBuf,
}

impl InstanceRef {
    /// Serialize to the single-line JSON form used on command lines.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the form produced by [`InstanceRef::to_json`].
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}
