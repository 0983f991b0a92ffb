//! # Exclusively locked, snapshot-persisted registry owner.
//!
//! [`RegistryStore`] is the only component allowed to hand out mutable access
//! to the [`Registry`], and it does so through a single exclusive lock. The
//! coordinator holds that lock for one full load→mutate→write-back pass; no
//! other path mutates colony state.
//!
//! ## Persistence
//! Snapshots are written via temp-file → flush → fsync → atomic rename, never
//! partial in-place edits. A reader therefore sees either the previous
//! complete snapshot or the new complete snapshot.
//!
//! ## Failure policy
//! - Missing snapshot file → fresh empty registry (first boot).
//! - Unreadable or corrupt snapshot → [`RuntimeError`]; the process must
//!   refuse to operate on unverifiable state.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};

use crate::error::RuntimeError;
use crate::registry::Registry;

/// Owner of the shared registry and its snapshot file.
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    inner: Mutex<Registry>,
}

impl RegistryStore {
    /// Opens the store, loading the snapshot at `path` if one exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let path = path.into();
        let registry = match fs::read_to_string(&path) {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| RuntimeError::CorruptSnapshot {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Registry::new(),
            Err(e) => return Err(RuntimeError::SnapshotIo(e)),
        };
        Ok(Self {
            path,
            inner: Mutex::new(registry),
        })
    }

    /// Creates a store around an already-built registry (bootstrap, tests).
    pub fn with_registry(path: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(registry),
        }
    }

    /// Acquires the exclusive registry lock.
    ///
    /// Held for the whole load→mutate→write-back of one coordinator
    /// invocation; never across unbounded blocking I/O.
    pub async fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().await
    }

    /// Persists `registry` with snapshot-then-atomic-replace semantics.
    pub fn persist(&self, registry: &Registry) -> Result<(), RuntimeError> {
        Self::write_snapshot(registry, &self.path)
    }

    /// Snapshot path this store owns.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(registry: &Registry, path: &Path) -> Result<(), RuntimeError> {
        let tmp = path.with_extension("tmp");
        let bytes = serde_json::to_vec(registry).map_err(|e| RuntimeError::CorruptSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ZooidRecord;

    #[tokio::test]
    async fn test_missing_snapshot_yields_fresh_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::open(dir.path().join("registry.json")).unwrap();
        let reg = store.lock().await;
        assert_eq!(reg.version, 0);
        assert!(reg.zooids.is_empty());
    }

    #[tokio::test]
    async fn test_persist_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let store = RegistryStore::open(&path).unwrap();
        {
            let mut reg = store.lock().await;
            reg.insert_candidate(ZooidRecord::candidate(
                "scout-a", "scout", "prod", "g1", vec![], 0.0,
            ))
            .unwrap();
            store.persist(&reg).unwrap();
        }

        let reopened = RegistryStore::open(&path).unwrap();
        let reg = reopened.lock().await;
        assert_eq!(reg.version, 1);
        assert!(reg.zooid("scout-a").is_some());
        // No temp file left behind after the atomic replace.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = RegistryStore::open(&path).unwrap_err();
        assert_eq!(err.as_label(), "runtime_corrupt_snapshot");
    }
}
