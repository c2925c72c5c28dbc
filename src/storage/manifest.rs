use std::fs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::storage::layout::StorageLayout;
use crate::storage::part::PartId;

/// Active-part list for one table.
///
/// The manifest is the commit point for every state change: a part file
/// becomes visible only once a manifest naming it lands, so an ingestion
/// batch that fails mid-write leaves the table untouched and the caller
/// free to retry the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub parts: Vec<PartId>,
    pub updated_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(parts: Vec<PartId>) -> Self {
        Manifest {
            parts,
            updated_at: Utc::now(),
        }
    }

    pub fn load(layout: &StorageLayout, table: &str) -> Result<Option<Self>> {
        let path = layout.manifest_path(table);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let manifest = bincode::deserialize(&data)?;
        Ok(Some(manifest))
    }

    /// Write-then-rename so a crash never leaves a torn manifest.
    pub fn save(&self, layout: &StorageLayout, table: &str) -> Result<()> {
        let path = layout.manifest_path(table);
        let tmp = path.with_extension("bin.tmp");

        let data = bincode::serialize(self)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
