//! runplane execution channel
//!
//! A launcher and the worker it starts talk through two files:
//!
//! - the **request file**, written once by the launcher with
//!   [`write_request`] and read once by the worker with [`read_request`];
//! - the **event file**, appended to by the worker through an
//!   [`EventWriter`] and followed by the launcher with an
//!   [`EventStreamReader`].
//!
//! Both files hold newline-delimited JSON records (see [`codec`]).
//!
//! [`ProcessHandle`] wraps the worker's OS process.

pub mod codec;
mod error;
mod process;
mod reader;
mod request;
mod writer;

pub use error::IpcError;
pub use process::{exit_code, open_ipc_subprocess, ProcessHandle};
pub use reader::{EventStreamReader, ReadOptions};
pub use request::{read_request, write_request};
pub use writer::EventWriter;
