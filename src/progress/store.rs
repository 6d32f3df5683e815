//! Progress persistence.
//!
//! The file store keeps one small TOML record per document under
//! `<store_dir>/<sha256(document id)>/progress.toml`, so arbitrary document ids
//! never turn into awkward file names.

use super::ProgressRecord;
use crate::text_utils::content_hash;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_DIR: &str = ".cache";
const RECORD_FILE: &str = "progress.toml";

/// The external owner of progress records. Both calls may fail; callers log
/// and carry on.
pub trait ProgressStore {
    fn get_progress(&self, document_id: &str) -> Result<Option<ProgressRecord>>;
    fn update_progress(&self, document_id: &str, record: &ProgressRecord) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hash_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(content_hash(document_id))
    }

    fn record_path(&self, document_id: &str) -> PathBuf {
        self.hash_dir(document_id).join(RECORD_FILE)
    }
}

impl Default for FileProgressStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_DIR)
    }
}

impl ProgressStore for FileProgressStore {
    fn get_progress(&self, document_id: &str) -> Result<Option<ProgressRecord>> {
        let path = self.record_path(document_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Reading progress record {}", path.display()))?;
        let record: ProgressRecord = toml::from_str(&data)
            .with_context(|| format!("Parsing progress record {}", path.display()))?;
        if record.document_id != document_id {
            anyhow::bail!(
                "Progress record at {} belongs to another document",
                path.display()
            );
        }
        Ok(Some(record))
    }

    fn update_progress(&self, document_id: &str, record: &ProgressRecord) -> Result<()> {
        let path = self.record_path(document_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating progress directory {}", parent.display()))?;
        }
        let contents = toml::to_string(record).context("Serializing progress record")?;
        fs::write(&path, contents)
            .with_context(|| format!("Writing progress record {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("readalong-{name}-{}", std::process::id()))
    }

    fn record(position: usize) -> ProgressRecord {
        ProgressRecord {
            document_id: "doc/with:odd*chars".to_string(),
            listen_position: position,
            listen_percent: 40,
            speed: 1.25,
        }
    }

    #[test]
    fn records_round_trip_through_hashed_directory() {
        let root = temp_root("store-roundtrip");
        let store = FileProgressStore::new(&root);
        let id = "doc/with:odd*chars";

        assert_eq!(store.get_progress(id).unwrap(), None);
        store.update_progress(id, &record(4)).unwrap();
        assert!(store.hash_dir(id).join(RECORD_FILE).exists());
        assert_eq!(store.get_progress(id).unwrap(), Some(record(4)));

        store.update_progress(id, &record(5)).unwrap();
        assert_eq!(
            store.get_progress(id).unwrap().map(|r| r.listen_position),
            Some(5)
        );
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let root = temp_root("store-corrupt");
        let store = FileProgressStore::new(&root);
        let dir = store.hash_dir("doc");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RECORD_FILE), "not = [valid").unwrap();
        assert!(store.get_progress("doc").is_err());
        let _ = fs::remove_dir_all(&root);
    }
}
