//! runplane Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process management
//! - Storage
//! - Runtime specifics
//!
//! Everything that crosses a process boundary (execution requests, channel
//! events, instance references) is defined here so both sides of the
//! channel agree on one serialized shape.

pub mod error;
pub mod event;
pub mod ids;
pub mod instance_ref;
pub mod origin;
pub mod request;
pub mod run;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{EngineEvent, Event, SerializableErrorInfo, SUBPROCESS_INIT_MARKER};
pub use ids::{EventId, RunId};
pub use instance_ref::InstanceRef;
pub use origin::Origin;
pub use request::ExecutionRequest;
pub use run::Run;
pub use status::RunStatus;
