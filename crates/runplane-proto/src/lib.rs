//! Generated gRPC code and converters for the runplane worker service.
//!
//! This crate contains:
//! - Generated protobuf message types
//! - Generated gRPC service stubs (client and server)
//! - Converters between proto messages and domain types

pub mod convert;

/// Generated protobuf types and services.
pub mod pb {
    // The path matches the proto package: runplane.v1
    include!("gen/runplane.v1.rs");
}

// Re-export commonly used types
pub use pb::worker_service_client::WorkerServiceClient;
pub use pb::worker_service_server::{WorkerService, WorkerServiceServer};
