//! JSON snapshots of a record store.
//!
//! A snapshot is every live record plus the time it was taken. The layout is
//! plain serde output of [`Record`] and carries no compatibility promise
//! across versions.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::Record;
use crate::record_set::RecordSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub saved_at: DateTime<Utc>,
    pub records: Vec<Record>,
}

impl CacheSnapshot {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            saved_at: Utc::now(),
            records,
        }
    }

    pub fn into_record_set(self) -> RecordSet {
        self.records.into_iter().collect()
    }

    /// Write to `path` atomically (write to a `.tmp` sibling, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|s| s.to_str()).unwrap_or("json")
        ));
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CacheReference;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let snapshot = CacheSnapshot::new(vec![
            Record::builder("QUERY_ROOT")
                .field("hero", CacheReference::new("2001"))
                .build(),
            Record::builder("2001").field("name", "R2-D2").build(),
        ]);

        snapshot.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = CacheSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.into_record_set().len(), 2);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CacheSnapshot::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, crate::error::CacheError::Io(_)));
    }
}
