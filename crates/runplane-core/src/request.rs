//! The request a launcher hands to a worker.

use serde::{Deserialize, Serialize};

use crate::{InstanceRef, Origin, RunId};

/// One execution attempt's instructions for a worker.
///
/// Built once per launch and discarded after the handshake. Unknown fields
/// are ignored when reading so older workers accept newer requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub origin: Origin,
    pub run_id: RunId,
    pub instance_ref: InstanceRef,
}

impl ExecutionRequest {
    pub fn new(origin: Origin, run_id: RunId, instance_ref: InstanceRef) -> Self {
        Self {
            origin,
            run_id,
            instance_ref,
        }
    }
}
