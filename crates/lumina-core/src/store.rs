//! Persistent per-image progress.
//!
//! One JSON document holds every image's saved grid. The store loads it
//! once on [`ProgressStore::open`], keeps it in memory, and rewrites the
//! whole document after every mutation. A corrupt document is never fatal:
//! the store starts empty, logs the failure, and leaves the bad file on disk
//! until the next successful write replaces it.
//!
//! Document layout:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": [
//!     { "imageId": "9f2c…", "lockedDifficulty": 2, "progress01": 0.5,
//!       "gridX": 16, "gridY": 16, "cells": [0.0, 1.0, …], "lastUpdated": 1760000000000 }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use lumina_logic::coverage::clamp_unit;
use lumina_logic::difficulty::Difficulty;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Document format version (increment when the layout changes).
pub const STORE_VERSION: u32 = 1;

pub const DEFAULT_STORE_FILE: &str = "lumina_image_progress_db.json";

/// Errors that can occur while persisting the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A sanitized progress record for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub image_id: String,
    pub locked_difficulty: Difficulty,
    /// Mean fill of `cells`, in `[0,1]`.
    pub progress: f32,
    pub grid_x: u32,
    pub grid_y: u32,
    /// Row-major snapshot, nominally `grid_x * grid_y` long.
    pub cells: Vec<f32>,
    /// Unix epoch milliseconds (UTC).
    pub last_updated: i64,
}

impl ProgressEntry {
    /// Whether the snapshot fits the recorded grid.
    pub fn has_valid_cells(&self) -> bool {
        self.cells.len() == self.grid_x as usize * self.grid_y as usize
    }
}

/// How the backing document was found on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file yet; the store starts empty.
    Missing,
    Loaded { entries: usize },
    /// The file could not be read or parsed; the store starts empty.
    Recovered,
}

// ── On-disk format ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StoreDocument {
    version: u32,
    entries: Vec<StoredEntry>,
}

/// Read side of [`StoreDocument`]. Entries stay untyped so one bad record
/// cannot fail the whole document.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

/// Raw record as written on disk. Lenient on read: every field is optional,
/// integers may be written as floats, `null` numbers read as zero, and
/// out-of-range values are repaired by [`StoredEntry::sanitized`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredEntry {
    image_id: String,
    #[serde(deserialize_with = "lenient_int")]
    locked_difficulty: i64,
    #[serde(deserialize_with = "lenient_unit")]
    progress01: f32,
    #[serde(deserialize_with = "lenient_int")]
    grid_x: i64,
    #[serde(deserialize_with = "lenient_int")]
    grid_y: i64,
    #[serde(deserialize_with = "lenient_cells")]
    cells: Option<Vec<f32>>,
    #[serde(deserialize_with = "lenient_int")]
    last_updated: i64,
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
        .unwrap_or(0))
}

fn lenient_unit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(clamp_unit(value.unwrap_or(0.0) as f32))
}

fn lenient_cells<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<f32>>, D::Error> {
    let cells = Option::<Vec<Option<f64>>>::deserialize(deserializer)?;
    Ok(cells.map(|cells| {
        cells
            .into_iter()
            .map(|c| clamp_unit(c.unwrap_or(0.0) as f32))
            .collect()
    }))
}

impl StoredEntry {
    fn sanitized(&self) -> ProgressEntry {
        ProgressEntry {
            image_id: self.image_id.clone(),
            locked_difficulty: Difficulty::from_ordinal(self.locked_difficulty),
            progress: clamp_unit(self.progress01),
            grid_x: self.grid_x.clamp(1, u32::MAX as i64) as u32,
            grid_y: self.grid_y.clamp(1, u32::MAX as i64) as u32,
            cells: self
                .cells
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|&c| clamp_unit(c))
                .collect(),
            last_updated: self.last_updated,
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────────

/// Keyed repository of per-image progress with at most one entry per id.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    entries: BTreeMap<String, StoredEntry>,
    load_status: LoadStatus,
    /// Set when the last write failed; cleared by the next successful one.
    dirty: bool,
}

impl ProgressStore {
    /// Open the document at `path`.
    ///
    /// Never fails: a missing file gives an empty store and an unreadable
    /// one gives an empty store plus an error log.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, load_status) = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<RawDocument>(&json) {
                Ok(doc) => {
                    if doc.version != STORE_VERSION {
                        log::warn!(
                            "Progress db {} has version {}, expected {}",
                            path.display(),
                            doc.version,
                            STORE_VERSION
                        );
                    }
                    let entries = index_entries(decode_entries(doc.entries));
                    let count = entries.len();
                    (entries, LoadStatus::Loaded { entries: count })
                }
                Err(e) => {
                    log::error!("Failed to parse progress db {}: {}", path.display(), e);
                    (BTreeMap::new(), LoadStatus::Recovered)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (BTreeMap::new(), LoadStatus::Missing)
            }
            Err(e) => {
                log::error!("Failed to read progress db {}: {}", path.display(), e);
                (BTreeMap::new(), LoadStatus::Recovered)
            }
        };

        log::debug!(
            "Opened progress db {} ({:?})",
            path.display(),
            load_status
        );

        Self {
            path,
            entries,
            load_status,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of every stored image, sorted.
    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Sanitized copy of the entry for `image_id`.
    pub fn get(&self, image_id: &str) -> Option<ProgressEntry> {
        if image_id.is_empty() {
            return None;
        }
        self.entries.get(image_id).map(StoredEntry::sanitized)
    }

    /// Saved progress for `image_id`, `0.0` when there is none.
    pub fn progress_of(&self, image_id: &str) -> f32 {
        self.get(image_id).map(|e| e.progress).unwrap_or(0.0)
    }

    /// Insert or overwrite the entry for `image_id` and persist.
    ///
    /// Whenever `progress` is positive the stored difficulty is re-stamped
    /// with `difficulty`, even if the entry already had one. The in-memory
    /// update stands even if the write fails.
    pub fn set(
        &mut self,
        image_id: &str,
        difficulty: Difficulty,
        grid_x: u32,
        grid_y: u32,
        cells: &[f32],
        progress: f32,
    ) -> Result<(), StoreError> {
        if image_id.is_empty() {
            return Ok(());
        }
        let progress = clamp_unit(progress);

        let entry = self
            .entries
            .entry(image_id.to_string())
            .or_insert_with(|| StoredEntry {
                image_id: image_id.to_string(),
                locked_difficulty: difficulty.ordinal() as i64,
                ..StoredEntry::default()
            });

        if progress > 0.0 {
            entry.locked_difficulty = difficulty.ordinal() as i64;
        }
        entry.progress01 = progress;
        entry.grid_x = grid_x.max(1) as i64;
        entry.grid_y = grid_y.max(1) as i64;
        entry.cells = Some(cells.iter().map(|&c| clamp_unit(c)).collect());
        entry.last_updated = chrono::Utc::now().timestamp_millis();

        self.persist()
    }

    /// Remove the entry for `image_id`, persisting only if one existed.
    pub fn reset(&mut self, image_id: &str) -> Result<(), StoreError> {
        if image_id.is_empty() || self.entries.remove(image_id).is_none() {
            return Ok(());
        }
        self.persist()
    }

    /// Flush a pending failed write and release the store.
    pub fn close(mut self) -> Result<(), StoreError> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    /// Rewrite the whole document atomically (temp file + rename).
    fn persist(&mut self) -> Result<(), StoreError> {
        let result = self.write_document();
        self.dirty = result.is_err();
        if let Err(e) = &result {
            log::error!("Failed to save progress db {}: {}", self.path.display(), e);
        }
        result
    }

    fn write_document(&self) -> Result<(), StoreError> {
        let doc = StoreDocument {
            version: STORE_VERSION,
            entries: self.entries.values().cloned().collect(),
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &doc)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Decode each raw record on its own, dropping the ones that do not fit.
fn decode_entries(raw: Vec<serde_json::Value>) -> Vec<StoredEntry> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<StoredEntry>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable progress entry #{}: {}", i, e);
                None
            }
        })
        .collect()
}

/// Key loaded records by id. Records without an id are dropped; for
/// duplicate ids the later record wins.
fn index_entries(entries: Vec<StoredEntry>) -> BTreeMap<String, StoredEntry> {
    let mut map = BTreeMap::new();
    for entry in entries {
        if entry.image_id.is_empty() {
            continue;
        }
        if map.insert(entry.image_id.clone(), entry).is_some() {
            log::warn!("Duplicate progress entry in db; keeping the later one");
        }
    }
    map
}

/// Pick the directory for the progress document.
///
/// `preferred` wins when it can be created and passes a write probe;
/// otherwise the document goes in `fallback`.
pub fn resolve_store_path(preferred: Option<&Path>, fallback: &Path, file_name: &str) -> PathBuf {
    if let Some(dir) = preferred {
        if is_writable_dir(dir) {
            return dir.join(file_name);
        }
        log::warn!(
            "Save dir {} is not writable, falling back to {}",
            dir.display(),
            fallback.display()
        );
    }
    fallback.join(file_name)
}

fn is_writable_dir(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".write_test");
    let ok = std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, ProgressStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::open(dir.path().join("progress.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load_status(), LoadStatus::Missing);
        assert!(store.is_empty());
        assert!(store.get("img1").is_none());
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, mut store) = temp_store();
        let cells = vec![0.5; 64];
        store
            .set("img1", Difficulty::Hard, 8, 8, &cells, 0.5)
            .unwrap();

        let entry = store.get("img1").unwrap();
        assert_eq!(entry.locked_difficulty, Difficulty::Hard);
        assert_eq!(entry.progress, 0.5);
        assert_eq!((entry.grid_x, entry.grid_y), (8, 8));
        assert_eq!(entry.cells, cells);
        assert!(entry.last_updated > 0);
    }

    #[test]
    fn test_positive_progress_restamps_difficulty() {
        let (_dir, mut store) = temp_store();
        store
            .set("img1", Difficulty::Hard, 8, 8, &[0.5; 64], 0.5)
            .unwrap();
        store
            .set("img1", Difficulty::Easy, 8, 8, &[0.7; 64], 0.7)
            .unwrap();
        assert_eq!(store.get("img1").unwrap().locked_difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_zero_progress_keeps_difficulty() {
        let (_dir, mut store) = temp_store();
        store
            .set("img1", Difficulty::Medium, 12, 12, &[0.1; 144], 0.1)
            .unwrap();
        store
            .set("img1", Difficulty::Hard, 12, 12, &[0.0; 144], 0.0)
            .unwrap();
        let entry = store.get("img1").unwrap();
        assert_eq!(entry.locked_difficulty, Difficulty::Medium);
        assert_eq!(entry.progress, 0.0);
    }

    #[test]
    fn test_reset_removes_entry() {
        let (_dir, mut store) = temp_store();
        store
            .set("img1", Difficulty::Easy, 8, 8, &[1.0; 64], 1.0)
            .unwrap();
        store.reset("img1").unwrap();
        assert!(store.get("img1").is_none());
        // Resetting again is a no-op.
        store.reset("img1").unwrap();
    }

    #[test]
    fn test_set_copies_cells() {
        let (_dir, mut store) = temp_store();
        let mut cells = vec![0.25; 4];
        store.set("img1", Difficulty::Easy, 2, 2, &cells, 0.25).unwrap();
        cells[0] = 1.0;
        assert_eq!(store.get("img1").unwrap().cells[0], 0.25);
    }

    #[test]
    fn test_set_clamps_inputs() {
        let (_dir, mut store) = temp_store();
        store.set("img1", Difficulty::Easy, 0, 0, &[], 3.0).unwrap();
        let entry = store.get("img1").unwrap();
        assert_eq!(entry.progress, 1.0);
        assert_eq!((entry.grid_x, entry.grid_y), (1, 1));
    }

    #[test]
    fn test_empty_id_is_ignored() {
        let (_dir, mut store) = temp_store();
        store.set("", Difficulty::Easy, 8, 8, &[0.0; 64], 0.5).unwrap();
        assert!(store.is_empty());
        assert!(store.get("").is_none());
    }

    #[test]
    fn test_reopen_reads_persisted_document() {
        let (dir, mut store) = temp_store();
        store.set("a", Difficulty::Medium, 2, 1, &[1.0, 0.0], 0.5).unwrap();
        store.set("b", Difficulty::Hard, 1, 1, &[1.0], 1.0).unwrap();
        store.close().unwrap();

        let store = ProgressStore::open(dir.path().join("progress.json"));
        assert_eq!(store.load_status(), LoadStatus::Loaded { entries: 2 });
        assert_eq!(store.get("a").unwrap().cells, vec![1.0, 0.0]);
        assert_eq!(store.progress_of("b"), 1.0);
        assert_eq!(store.progress_of("missing"), 0.0);
    }

    #[test]
    fn test_corrupt_document_recovers_empty_and_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let mut store = ProgressStore::open(&path);
        assert_eq!(store.load_status(), LoadStatus::Recovered);
        assert!(store.is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{ this is not json"
        );

        store.set("img1", Difficulty::Easy, 1, 1, &[0.5], 0.5).unwrap();
        let reopened = ProgressStore::open(&path);
        assert_eq!(reopened.progress_of("img1"), 0.5);
    }

    #[test]
    fn test_out_of_range_record_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{ "version": 1, "entries": [
                { "imageId": "x", "lockedDifficulty": 9, "progress01": 4.5,
                  "gridX": -3, "gridY": 0, "cells": null, "lastUpdated": 7 },
                { "imageId": "", "progress01": 0.3 }
            ] }"#,
        )
        .unwrap();

        let store = ProgressStore::open(&path);
        assert_eq!(store.len(), 1);
        let entry = store.get("x").unwrap();
        assert_eq!(entry.locked_difficulty, Difficulty::Hard);
        assert_eq!(entry.progress, 1.0);
        assert_eq!((entry.grid_x, entry.grid_y), (1, 1));
        assert!(entry.cells.is_empty());
        assert!(!entry.has_valid_cells());
    }

    #[test]
    fn test_nan_cell_is_cleaned_and_reopens() {
        let (dir, mut store) = temp_store();
        store.set("good", Difficulty::Hard, 1, 1, &[1.0], 1.0).unwrap();
        store
            .set("bad", Difficulty::Easy, 2, 1, &[f32::NAN, 1.5], 0.25)
            .unwrap();
        assert_eq!(store.get("bad").unwrap().cells, vec![0.0, 1.0]);
        store.close().unwrap();

        let json = std::fs::read_to_string(dir.path().join("progress.json")).unwrap();
        assert!(!json.contains("null"));

        let reopened = ProgressStore::open(dir.path().join("progress.json"));
        assert_eq!(reopened.load_status(), LoadStatus::Loaded { entries: 2 });
        assert_eq!(reopened.progress_of("good"), 1.0);
        assert_eq!(reopened.get("bad").unwrap().cells, vec![0.0, 1.0]);
    }

    #[test]
    fn test_null_numbers_read_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{ "entries": [
                { "imageId": "x", "lockedDifficulty": 1, "progress01": null,
                  "gridX": 2, "gridY": 1, "cells": [null, 0.5] }
            ] }"#,
        )
        .unwrap();

        let store = ProgressStore::open(&path);
        let entry = store.get("x").unwrap();
        assert_eq!(entry.cells, vec![0.0, 0.5]);
        assert_eq!(entry.progress, 0.0);
    }

    #[test]
    fn test_bad_entry_does_not_drop_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{ "version": 1, "entries": [
                { "imageId": "good", "lockedDifficulty": 2, "progress01": 0.5,
                  "gridX": 1, "gridY": 1, "cells": [0.5] },
                { "imageId": "float", "lockedDifficulty": 1.0, "progress01": 0.25,
                  "gridX": 2.0, "gridY": 1, "cells": [0.5, 0.0] },
                { "imageId": 42, "progress01": 0.9 },
                { "imageId": "typo", "cells": "oops" }
            ] }"#,
        )
        .unwrap();

        let store = ProgressStore::open(&path);
        assert_eq!(store.load_status(), LoadStatus::Loaded { entries: 2 });
        assert_eq!(store.progress_of("good"), 0.5);

        let float = store.get("float").unwrap();
        assert_eq!(float.locked_difficulty, Difficulty::Medium);
        assert_eq!((float.grid_x, float.grid_y), (2, 1));
        assert!(float.has_valid_cells());
        assert!(store.get("typo").is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{ "entries": [ { "imageId": "x", "progress01": 0.1 },
                              { "imageId": "x", "progress01": 0.9 } ] }"#,
        )
        .unwrap();
        let store = ProgressStore::open(&path);
        assert_eq!(store.len(), 1);
        assert!((store.progress_of("x") - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let (dir, mut store) = temp_store();
        store.set("img1", Difficulty::Medium, 1, 1, &[0.5], 0.5).unwrap();
        let json = std::fs::read_to_string(dir.path().join("progress.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        let entry = &value["entries"][0];
        assert_eq!(entry["imageId"], "img1");
        assert_eq!(entry["lockedDifficulty"], 1);
        assert_eq!(entry["gridX"], 1);
        assert!(entry["lastUpdated"].is_i64());
    }

    #[test]
    fn test_resolve_prefers_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let preferred = dir.path().join("saves");
        let fallback = dir.path().join("fallback");
        let path = resolve_store_path(Some(&preferred), &fallback, "db.json");
        assert_eq!(path, preferred.join("db.json"));
        assert!(!preferred.join(".write_test").exists());
    }

    #[test]
    fn test_resolve_falls_back_when_preferred_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let path = resolve_store_path(Some(&blocker), dir.path(), "db.json");
        assert_eq!(path, dir.path().join("db.json"));
    }
}
