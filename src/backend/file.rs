//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::codec;
use crate::error::Result;
use crate::types::Snapshot;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stores the snapshot as a single record frame in one file.
///
/// A non-existent file reads as `None` (nothing ever persisted). An
/// existing empty file holds zero records, which also reads as `None`
/// since it carries no usable snapshot. Each persist rewrites the whole
/// file; if a file somehow holds several frames, the last one wins.
pub struct FileBackend {
    /// Path to the snapshot file.
    path: PathBuf,

    /// Minimum time between persist starts.
    throttle: Option<Duration>,
}

impl FileBackend {
    /// Create a backend writing to `path`, with no throttling.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            throttle: None,
        }
    }

    /// Create a backend with a throttle window.
    pub fn with_throttle(path: impl AsRef<Path>, throttle: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            throttle: Some(throttle),
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_state(&self) -> Result<Option<Snapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut records = codec::decode(&bytes)?;
        Ok(records.pop().map(Snapshot::new))
    }

    fn delete_state(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist_difference(
        &self,
        _last_persisted: Option<&Snapshot>,
        new_snapshot: &Snapshot,
    ) -> Result<()> {
        // Full rewrite: the file holds exactly one frame, so the delta
        // hint is not used.
        let bytes = codec::encode(std::slice::from_ref(new_snapshot.value()))?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn throttle(&self) -> Option<Duration> {
        self.throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_absent_file() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("state.bin"));
        assert!(backend.read_state().unwrap().is_none());
    }

    #[test]
    fn test_read_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.bin");
        fs::write(&path, b"").unwrap();

        let backend = FileBackend::new(&path);
        assert!(backend.read_state().unwrap().is_none());
    }

    #[test]
    fn test_persist_and_read_back() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("state.bin"));

        let snap = Snapshot::new(json!({"count": 3}));
        backend.persist_difference(None, &snap).unwrap();

        let read = backend.read_state().unwrap().unwrap();
        assert_eq!(read.value(), snap.value());
        assert!(!read.same_as(&snap)); // fresh handle, same contents
    }

    #[test]
    fn test_delete_state() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("state.bin"));

        let snap = Snapshot::new(json!(1));
        backend.persist_difference(None, &snap).unwrap();
        backend.delete_state().unwrap();
        assert!(backend.read_state().unwrap().is_none());

        // Deleting again is not an error.
        backend.delete_state().unwrap();
    }

    #[test]
    fn test_overwrite_keeps_single_frame() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("state.bin"));

        let first = Snapshot::new(json!("first"));
        let second = Snapshot::new(json!("second"));
        backend.persist_difference(None, &first).unwrap();
        backend
            .persist_difference(Some(&first), &second)
            .unwrap();

        let bytes = fs::read(backend.path()).unwrap();
        assert_eq!(codec::decode(&bytes).unwrap(), vec![json!("second")]);
    }
}
