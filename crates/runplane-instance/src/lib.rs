//! runplane instance
//!
//! An [`Instance`] is the process-wide handle on persistent run and event
//! storage. Launchers use it to look up runs, record engine events and mark
//! runs failed. Any process can open the same stores from an
//! [`InstanceRef`](runplane_core::InstanceRef).

mod config;
mod error;
mod instance;
mod storage;

pub use config::{InstanceConfig, StorageConfig, CONFIG_FILE_NAME};
pub use error::InstanceError;
pub use instance::Instance;
pub use storage::{EventLogEntry, EventLogKind};
