//! On-disk record store.
//!
//! Layout under the store root (default `<data_dir>/skysniffer/`):
//!
//!   records.json       — every ScanRecord, in insertion order
//!   images/<id>.jpg    — image bytes, kept out of the index
//!
//! The index is rewritten through a temp file + rename so a crash never
//! leaves it half-written.

use super::{RecordId, RecordStore, ScanRecord};
use crate::error::ScanError;
use crate::llm::DetectionResult;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const INDEX_FILE: &str = "records.json";
const IMAGES_DIR: &str = "images";

pub struct JsonFileStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on the index.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        log::info!("[STORE] Using {}", root.display());
        Self {
            root,
            lock: Mutex::new(()),
        }
    }

    /// Default location under the platform data directory.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("skysniffer"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn image_path(&self, file_name: &str) -> PathBuf {
        self.root.join(IMAGES_DIR).join(file_name)
    }

    fn read_index(&self) -> Result<Vec<ScanRecord>, ScanError> {
        let path = self.index_path();
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                log::error!("[STORE] Corrupt index {}: {}", path.display(), e);
                unavailable(format!("corrupt index: {}", e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(unavailable(format!("read {}: {}", path.display(), e))),
        }
    }

    fn write_index(&self, records: &[ScanRecord]) -> Result<(), ScanError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| unavailable(format!("create {}: {}", self.root.display(), e)))?;
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| unavailable(format!("serialize index: {}", e)))?;
        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| unavailable(format!("write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| unavailable(format!("rename {}: {}", path.display(), e)))
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, ScanError> {
        self.lock
            .lock()
            .map_err(|_| unavailable("store lock poisoned".to_string()))
    }
}

impl RecordStore for JsonFileStore {
    fn save(&self, result: &DetectionResult, image: Option<&[u8]>) -> Result<RecordId, ScanError> {
        let _guard = self.guard()?;
        let mut records = self.read_index()?;

        let id = RecordId::new();
        let image_file = match image {
            Some(bytes) => {
                let name = format!("{}.jpg", id);
                let path = self.image_path(&name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| unavailable(format!("create {}: {}", parent.display(), e)))?;
                }
                std::fs::write(&path, bytes)
                    .map_err(|e| unavailable(format!("write {}: {}", path.display(), e)))?;
                Some(name)
            }
            None => None,
        };

        records.push(ScanRecord::from_detection(result, id, Utc::now(), image_file));
        if let Err(e) = self.write_index(&records) {
            // Don't leave an orphaned image behind.
            let _ = std::fs::remove_file(self.image_path(&format!("{}.jpg", id)));
            return Err(e);
        }

        log::info!("[STORE] Saved {} ({} records)", id, records.len());
        Ok(id)
    }

    fn list(&self) -> Result<Vec<ScanRecord>, ScanError> {
        let _guard = self.guard()?;
        let mut records = self.read_index()?;
        // Later insertions win timestamp ties.
        records.reverse();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    fn has_image(&self, record: &ScanRecord) -> bool {
        record
            .image_file
            .as_deref()
            .is_some_and(|name| self.image_path(name).is_file())
    }

    fn load_image(&self, record: &ScanRecord) -> Result<Option<Vec<u8>>, ScanError> {
        let Some(name) = &record.image_file else {
            return Ok(None);
        };
        let path = self.image_path(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("[STORE] Image missing for {}: {}", record.id, path.display());
                Ok(None)
            }
            Err(e) => Err(unavailable(format!("read {}: {}", path.display(), e))),
        }
    }

    fn delete(&self, ids: &HashSet<RecordId>) -> Result<(), ScanError> {
        if ids.is_empty() {
            return Ok(());
        }
        let _guard = self.guard()?;
        let records = self.read_index()?;
        let before = records.len();

        let (removed, kept): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| ids.contains(&r.id));
        if removed.is_empty() {
            return Ok(());
        }

        self.write_index(&kept)?;
        for record in &removed {
            if let Some(name) = &record.image_file {
                let _ = std::fs::remove_file(self.image_path(name));
            }
        }
        log::info!(
            "[STORE] Deleted {} of {} records",
            before - kept.len(),
            before
        );
        Ok(())
    }
}

fn unavailable(detail: String) -> ScanError {
    ScanError::StoreUnavailable(detail)
}
