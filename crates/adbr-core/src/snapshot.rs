//! Whole-document snapshot persistence
//!
//! Both the exposure snapshot and the tunnel snapshot are JSON arrays that
//! are only ever replaced as a whole. Readers treat a missing or unreadable
//! document as an empty list.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SnapshotError;

/// Durable storage for one snapshot document
#[async_trait]
pub trait SnapshotStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Read the current document; missing or unreadable yields an empty list
    async fn load(&self) -> Vec<T>;

    /// Replace the document with `entries`
    async fn save(&self, entries: &[T]) -> Result<(), SnapshotError>;
}

/// Pretty-printed JSON array stored in a file
#[derive(Debug)]
pub struct JsonSnapshot<T> {
    path: PathBuf,
    _entry: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonSnapshot<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<T> JsonSnapshot<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _entry: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take an exclusive advisory lock scoped to this document.
    ///
    /// The lock lives on a sibling `.lock` file so that replacing the
    /// document by rename does not drop it. Waits until the lock is free.
    pub async fn lock(&self) -> Result<SnapshotLock, SnapshotError> {
        let lock_path = sibling(&self.path, ".lock");

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| SnapshotError::Lock {
                    path: lock_path.clone(),
                    source,
                })?;
            }

            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .and_then(|file| file.lock_exclusive().map(|()| file))
                .map_err(|source| SnapshotError::Lock {
                    path: lock_path.clone(),
                    source,
                })?;

            Ok(SnapshotLock { file, path: lock_path })
        })
        .await
        .map_err(|e| SnapshotError::Lock {
            path: sibling(&self.path, ".lock"),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?
    }
}

#[async_trait]
impl<T> SnapshotStore<T> for JsonSnapshot<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Vec<T> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Snapshot {:?} does not exist yet", self.path);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read snapshot {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed snapshot {:?}: {}", self.path, e);
            Vec::new()
        })
    }

    async fn save(&self, entries: &[T]) -> Result<(), SnapshotError> {
        let mut document = serde_json::to_vec_pretty(entries)?;
        document.push(b'\n');

        let io_err = |source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Readers see either the previous document or this one, never a torn write.
        let staging = sibling(&self.path, ".tmp");
        tokio::fs::write(&staging, &document).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &self.path).await.map_err(io_err)?;

        tracing::trace!("Wrote {} entries to {:?}", entries.len(), self.path);
        Ok(())
    }
}

/// Exclusive lock on a snapshot document, released on drop
#[derive(Debug)]
pub struct SnapshotLock {
    file: File,
    path: PathBuf,
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {:?}: {}", self.path, e);
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(Into::into).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// In-memory snapshot, for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySnapshot<T> {
    entries: Mutex<Vec<T>>,
    writes: Mutex<usize>,
}

impl<T: Clone> MemorySnapshot<T> {
    pub fn new(entries: Vec<T>) -> Self {
        Self {
            entries: Mutex::new(entries),
            writes: Mutex::new(0),
        }
    }

    /// Current document contents
    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of completed saves
    pub fn writes(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or_default()
    }
}

#[async_trait]
impl<T> SnapshotStore<T> for MemorySnapshot<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> Vec<T> {
        self.entries()
    }

    async fn save(&self, entries: &[T]) -> Result<(), SnapshotError> {
        if let Ok(mut current) = self.entries.lock() {
            *current = entries.to_vec();
        }
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExposedDevice, Tunnel};
    use tempfile::TempDir;

    fn exposed(serial: &str, port: u16) -> ExposedDevice {
        ExposedDevice {
            serial: serial.to_string(),
            model: "Pixel_6".to_string(),
            port,
            host: "192.168.1.5".to_string(),
            state: "available".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshot::<ExposedDevice>::new(dir.path().join("absent.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonSnapshot::<Tunnel>::new(&path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshot::new(dir.path().join("state.json"));

        store.save(&[exposed("A", 15000), exposed("B", 15001)]).await.unwrap();
        store.save(&[exposed("B", 15001)]).await.unwrap();

        assert_eq!(store.load().await, vec![exposed("B", 15001)]);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_document_is_pretty_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonSnapshot::<ExposedDevice>::new(&path);

        store.save(&[]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");

        store.save(&[exposed("ABC123", 15000)]).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  {\n    \"serial\": \"ABC123\""));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshot::<Tunnel>::new(dir.path().join("client.json"));

        let guard = store.lock().await.unwrap();
        let contender = store.clone();
        let waiter = tokio::spawn(async move { contender.lock().await.map(|_| ()) });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_memory_snapshot_counts_writes() {
        let store = MemorySnapshot::new(vec![exposed("A", 1)]);
        assert_eq!(store.load().await.len(), 1);

        store.save(&[]).await.unwrap();
        assert!(store.entries().is_empty());
        assert_eq!(store.writes(), 1);
    }
}
