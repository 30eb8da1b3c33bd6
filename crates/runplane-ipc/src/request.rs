//! The request file.

use std::io::Write;
use std::path::Path;

use runplane_core::ExecutionRequest;
use tracing::debug;

use crate::codec::encode_record;
use crate::error::IpcError;

/// Write `request` to `path` atomically.
///
/// The record goes to a temporary file in the same directory which is then
/// renamed into place, so a reader never observes a partial request.
pub fn write_request(path: &Path, request: &ExecutionRequest) -> Result<(), IpcError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&encode_record(request)?)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), run_id = %request.run_id, "Wrote execution request");
    Ok(())
}

/// Read the request written by [`write_request`].
pub fn read_request(path: &Path) -> Result<ExecutionRequest, IpcError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|source| IpcError::Deserialization { offset: 0, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use runplane_core::{InstanceRef, Origin, RunId};
    use std::path::PathBuf;

    #[test]
    fn test_write_then_read_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        let request = ExecutionRequest::new(
            Origin::LocalExecutable {
                path: PathBuf::from("/opt/worker"),
            },
            RunId::generate(),
            InstanceRef {
                home: dir.path().to_path_buf(),
                storage_dir: dir.path().join("storage"),
            },
        );

        write_request(&path, &request).unwrap();
        assert_eq!(read_request(&path).unwrap(), request);

        // Only the request itself is left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_malformed_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, b"{\"origin\": 1}").unwrap();

        assert!(matches!(
            read_request(&path),
            Err(IpcError::Deserialization { .. })
        ));
    }
}
