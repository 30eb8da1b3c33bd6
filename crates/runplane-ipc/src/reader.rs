//! Launcher side of the event file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use runplane_core::Event;
use serde::de::Error as _;
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::codec::decode_event;
use crate::error::IpcError;
use crate::process::ProcessHandle;

const READ_CHUNK: usize = 8 * 1024;
const DEFAULT_MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// Tuning for [`EventStreamReader`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Sleep between reads while no complete record is available.
    pub poll_interval: Duration,
    /// How long to wait for the file to be created.
    pub appear_timeout: Duration,
    /// Byte offset to start reading from.
    pub offset: u64,
    /// Longest record accepted, newline excluded.
    pub max_record_bytes: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            appear_timeout: Duration::from_secs(30),
            offset: 0,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// Follows an event file that another process is appending to.
///
/// Nothing happens until the first call to
/// [`next_event`](Self::next_event). The reader yields whole records only,
/// in file order, and ends on [`Event::StreamEnd`] or, when an owner process
/// is attached, once the owner has exited and no complete record is left.
/// [`offset`](Self::offset) can seed a new reader that resumes where this one
/// stopped.
pub struct EventStreamReader {
    path: PathBuf,
    options: ReadOptions,
    file: Option<File>,
    /// Bytes consumed as complete records.
    offset: u64,
    /// Bytes read past `offset` that do not yet form a complete record.
    pending: Vec<u8>,
    owner: Option<ProcessHandle>,
    _scratch: Option<TempDir>,
    finished: bool,
}

impl EventStreamReader {
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> Self {
        let offset = options.offset;
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            file: None,
            offset,
            pending: Vec::new(),
            owner: None,
            _scratch: None,
            finished: false,
        }
    }

    /// Stop once `owner` has exited and everything it wrote has been read.
    pub fn with_owner(mut self, owner: ProcessHandle) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Keep `dir` (which holds the event file) alive as long as the reader.
    pub fn with_scratch_dir(mut self, dir: TempDir) -> Self {
        self._scratch = Some(dir);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset just past the last record returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Next event, or `None` once the stream is over.
    pub async fn next_event(&mut self) -> Result<Option<Event>, IpcError> {
        if self.finished {
            return Ok(None);
        }

        if self.file.is_none() {
            match self.wait_for_file().await {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }

        loop {
            if let Some(event) = self.take_record()? {
                if matches!(event, Event::StreamEnd) {
                    debug!(path = %self.path.display(), offset = self.offset, "Event stream ended");
                    self.finished = true;
                    return Ok(None);
                }
                return Ok(Some(event));
            }

            if self.pending.len() > self.options.max_record_bytes {
                self.finished = true;
                return Err(self.oversized_record());
            }

            if self.fill().await? > 0 {
                continue;
            }

            if self.owner_exited() {
                // The owner may have written between our last read and its exit.
                if self.fill().await? > 0 {
                    continue;
                }
                if !self.pending.is_empty() {
                    warn!(
                        path = %self.path.display(),
                        bytes = self.pending.len(),
                        "Discarding incomplete trailing record after writer exited"
                    );
                }
                debug!(path = %self.path.display(), "Writer exited, event stream over");
                self.finished = true;
                return Ok(None);
            }

            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// Adapt into a `Stream`. Dropping the stream stops reading.
    pub fn into_stream(self) -> impl Stream<Item = Result<Event, IpcError>> + Send {
        stream::unfold(self, |mut reader| async move {
            match reader.next_event().await {
                Ok(Some(event)) => Some((Ok(event), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }

    fn owner_exited(&self) -> bool {
        self.owner.as_ref().is_some_and(|owner| !owner.is_alive())
    }

    async fn wait_for_file(&self) -> Result<File, IpcError> {
        let deadline = Instant::now() + self.options.appear_timeout;

        loop {
            // Checked before opening so a file created right before the owner
            // exited is still seen.
            let give_up = Instant::now() >= deadline || self.owner_exited();

            match File::open(&self.path).await {
                Ok(mut file) => {
                    file.seek(std::io::SeekFrom::Start(self.offset)).await?;
                    return Ok(file);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if give_up {
                        return Err(IpcError::NotFound {
                            path: self.path.clone(),
                            waited: self.options.appear_timeout,
                        });
                    }
                    tokio::time::sleep(self.options.poll_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn oversized_record(&self) -> IpcError {
        warn!(
            path = %self.path.display(),
            offset = self.offset,
            limit = self.options.max_record_bytes,
            "Record exceeds size limit"
        );
        IpcError::Deserialization {
            offset: self.offset,
            source: serde_json::Error::custom(format!(
                "record longer than {} bytes without a newline",
                self.options.max_record_bytes
            )),
        }
    }

    /// Read whatever is available into `pending`.
    async fn fill(&mut self) -> Result<usize, IpcError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        let mut chunk = [0u8; READ_CHUNK];
        let read = file.read(&mut chunk).await?;
        self.pending.extend_from_slice(&chunk[..read]);
        Ok(read)
    }

    /// Pop the next complete record out of `pending`, skipping blank lines.
    fn take_record(&mut self) -> Result<Option<Event>, IpcError> {
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let start = self.offset;
            self.offset += line.len() as u64;

            let body = &line[..line.len() - 1];
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let event = decode_event(body, start)?;
            trace!(offset = start, kind = event.kind(), "Read event");
            return Ok(Some(event));
        }
        Ok(None)
    }
}
