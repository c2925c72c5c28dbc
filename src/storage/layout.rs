use std::fs;
use std::path::PathBuf;

use crate::core::error::Result;
use crate::storage::part::PartId;

/// Directory structure for store data.
///
/// ```text
/// <base>/
///   meta/                  schema manifests
///   <table>/
///     manifest.bin         active part list, rewritten last on commit
///     parts/
///       <uuid>.part        immutable sorted run
///       <uuid>.del         tombstone bitmap, present once rows were purged
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
    pub meta_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let meta_dir = base_dir.join("meta");
        fs::create_dir_all(&meta_dir)?;

        Ok(StorageLayout { base_dir, meta_dir })
    }

    pub fn ensure_table_dirs(&self, table: &str) -> Result<()> {
        fs::create_dir_all(self.parts_dir(table))?;
        Ok(())
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.base_dir.join(table)
    }

    pub fn parts_dir(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("parts")
    }

    pub fn part_path(&self, table: &str, id: &PartId) -> PathBuf {
        self.parts_dir(table).join(format!("{}.part", id.0))
    }

    pub fn tombstone_path(&self, table: &str, id: &PartId) -> PathBuf {
        self.parts_dir(table).join(format!("{}.del", id.0))
    }

    pub fn manifest_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("manifest.bin")
    }

    pub fn schema_path(&self, table: &str) -> PathBuf {
        self.meta_dir.join(format!("{}.schema", table))
    }
}
