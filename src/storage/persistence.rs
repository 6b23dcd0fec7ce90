//! Snapshot persistence for the embedded document store
//!
//! Every collection lives in its own `<collection>.json` file under the data
//! directory. A write replaces the whole file atomically: the snapshot is
//! written to a temporary file in the same directory and renamed over the
//! old one, so a crash leaves either the previous or the new snapshot.

use super::Collection;
use crate::core::{Result, StoreError};
use crate::document::Document;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SNAPSHOT_EXTENSION: &str = "json";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Whether snapshot writes are fsync'ed before they are renamed into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Flush file contents to disk before every rename.
    #[default]
    Sync,
    /// Leave flushing to the operating system.
    Async,
}

// ============================================================================
// Snapshot File Format
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub version: u32,
    pub collection: String,
    pub written_at: DateTime<Utc>,
    pub documents: Vec<Document>,
}

impl CollectionSnapshot {
    pub fn of(collection: &Collection) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            collection: collection.name().to_string(),
            written_at: Utc::now(),
            documents: collection.documents().to_vec(),
        }
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    data_dir: PathBuf,
    durability_mode: DurabilityMode,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| {
            StoreError::StoreUnavailable(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            data_dir,
            durability_mode,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }

    fn snapshot_path(&self, collection: &str) -> PathBuf {
        self.data_dir
            .join(collection)
            .with_extension(SNAPSHOT_EXTENSION)
    }

    pub fn save(&self, collection: &Collection) -> Result<()> {
        let snapshot = CollectionSnapshot::of(collection);
        let temp = NamedTempFile::new_in(&self.data_dir).map_err(|e| {
            StoreError::StoreUnavailable(format!("Failed to create temp file: {}", e))
        })?;

        let mut writer = BufWriter::new(temp);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush().map_err(|e| {
            StoreError::StoreUnavailable(format!("Failed to flush snapshot: {}", e))
        })?;
        let temp = writer.into_inner().map_err(|e| {
            StoreError::StoreUnavailable(format!("Failed to flush snapshot: {}", e.error()))
        })?;

        if self.durability_mode == DurabilityMode::Sync {
            temp.as_file().sync_all().map_err(|e| {
                StoreError::StoreUnavailable(format!("Failed to sync snapshot: {}", e))
            })?;
        }

        temp.persist(self.snapshot_path(collection.name()))
            .map_err(|e| {
                StoreError::StoreUnavailable(format!("Failed to rename snapshot: {}", e.error))
            })?;
        Ok(())
    }

    fn read_snapshot(path: &Path) -> Result<CollectionSnapshot> {
        let file = File::open(path).map_err(|e| {
            StoreError::StoreUnavailable(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn into_collection(snapshot: CollectionSnapshot, path: &Path) -> Result<Collection> {
        if snapshot.version != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::Serialization(format!(
                "Unsupported snapshot version {} in {}",
                snapshot.version,
                path.display()
            )));
        }
        Collection::from_documents(snapshot.collection, snapshot.documents)
    }

    pub fn load(&self, collection: &str) -> Result<Option<Collection>> {
        let path = self.snapshot_path(collection);
        if !path.exists() {
            return Ok(None);
        }
        let snapshot = Self::read_snapshot(&path)?;
        Self::into_collection(snapshot, &path).map(Some)
    }

    /// Load every collection snapshot found in the data directory.
    ///
    /// JSON files that are not snapshots of the collection they are named
    /// after are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<Collection>> {
        let entries = fs::read_dir(&self.data_dir)?;
        let mut collections = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let snapshot = match Self::read_snapshot(&path) {
                Ok(snapshot) => snapshot,
                Err(StoreError::Serialization(reason)) => {
                    warn!("Ignoring {}: not a collection snapshot ({})", path.display(), reason);
                    continue;
                }
                Err(err) => return Err(err),
            };
            if snapshot.collection != name {
                warn!(
                    "Ignoring {}: holds collection '{}'",
                    path.display(),
                    snapshot.collection
                );
                continue;
            }
            collections.push(Self::into_collection(snapshot, &path)?);
        }
        Ok(collections)
    }

    pub fn delete(&self, collection: &str) -> Result<()> {
        let path = self.snapshot_path(collection);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                StoreError::StoreUnavailable(format!("Failed to delete snapshot: {}", e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sequences() -> Collection {
        let mut collection = Collection::new("BATCH_SEQUENCES");
        collection
            .insert(
                json!({"id": "STEP_EXECUTION_SEQ", "value": 41, "note": ""})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        collection
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();
        manager.save(&sequences()).unwrap();

        let loaded = manager.load("BATCH_SEQUENCES").unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.documents()[0].get("value"), Some(&json!(41)));
    }

    #[test]
    fn test_missing_snapshot_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path(), DurabilityMode::Async).unwrap();
        assert!(manager.load("BATCH_STEP_EXECUTION").unwrap().is_none());
        assert!(manager.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_load_all_skips_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();
        manager.save(&sequences()).unwrap();
        fs::write(temp_dir.path().join("README.txt"), "not a snapshot").unwrap();

        let loaded = manager.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "BATCH_SEQUENCES");
    }

    #[test]
    fn test_load_all_ignores_unrelated_json() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();
        manager.save(&sequences()).unwrap();
        fs::write(temp_dir.path().join("settings.json"), r#"{"theme": "dark"}"#).unwrap();
        fs::write(temp_dir.path().join("broken.json"), "{").unwrap();
        fs::copy(
            temp_dir.path().join("BATCH_SEQUENCES.json"),
            temp_dir.path().join("COPY_OF_SEQUENCES.json"),
        )
        .unwrap();

        let loaded = manager.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "BATCH_SEQUENCES");
    }

    #[test]
    fn test_unsupported_snapshot_version_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();
        fs::write(
            temp_dir.path().join("BATCH_SEQUENCES.json"),
            r#"{"version": 99, "collection": "BATCH_SEQUENCES", "written_at": "2024-01-01T00:00:00Z", "documents": []}"#,
        )
        .unwrap();

        assert!(matches!(manager.load_all(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_delete_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();
        manager.save(&sequences()).unwrap();
        manager.delete("BATCH_SEQUENCES").unwrap();
        assert!(manager.load("BATCH_SEQUENCES").unwrap().is_none());
        manager.delete("BATCH_SEQUENCES").unwrap();
    }
}
