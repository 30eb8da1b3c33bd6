//! Converters between proto messages and domain types.
//!
//! The worker service wire format carries JSON documents inside string
//! fields, so every conversion can fail with a [`serde_json::Error`].

use crate::pb;
use runplane_core::{Event, ExecutionRequest};

// ============================================================================
// ExecutionRequest conversions
// ============================================================================

impl TryFrom<&ExecutionRequest> for pb::ExecuteRunRequest {
    type Error = serde_json::Error;

    fn try_from(request: &ExecutionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            serialized_execute_run_args: serde_json::to_string(request)?,
        })
    }
}

impl TryFrom<&pb::ExecuteRunRequest> for ExecutionRequest {
    type Error = serde_json::Error;

    fn try_from(request: &pb::ExecuteRunRequest) -> Result<Self, Self::Error> {
        serde_json::from_str(&request.serialized_execute_run_args)
    }
}

// ============================================================================
// Event conversions
// ============================================================================

impl TryFrom<&Event> for pb::ExecuteRunEvent {
    type Error = serde_json::Error;

    fn try_from(event: &Event) -> Result<Self, Self::Error> {
        Ok(Self {
            serialized_message: serde_json::to_string(event)?,
        })
    }
}

impl TryFrom<&pb::ExecuteRunEvent> for Event {
    type Error = serde_json::Error;

    fn try_from(message: &pb::ExecuteRunEvent) -> Result<Self, Self::Error> {
        serde_json::from_str(&message.serialized_message)
    }
}
