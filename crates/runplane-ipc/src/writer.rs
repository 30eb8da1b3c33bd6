//! Worker side of the event file.

use std::path::{Path, PathBuf};

use runplane_core::Event;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::codec::encode_record;
use crate::error::IpcError;

/// Appends events to an event file.
///
/// Each record is handed to the OS in one write and flushed, so a reader
/// sees either nothing or a whole line.
pub struct EventWriter {
    path: PathBuf,
    file: File,
}

impl EventWriter {
    /// Open `path` for appending, creating it if needed.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { path, file })
    }

    /// Append one event.
    pub async fn write_event(&mut self, event: &Event) -> Result<(), IpcError> {
        let bytes = encode_record(event)?;
        self.file.write_all(&bytes).await?;
        self.file.flush().await?;
        trace!(path = %self.path.display(), kind = event.kind(), "Wrote event");
        Ok(())
    }

    /// Append the terminal record and close the file.
    pub async fn finish(mut self) -> Result<(), IpcError> {
        self.write_event(&Event::StreamEnd).await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
