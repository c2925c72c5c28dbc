use std::fs;

use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::schema::TableSchema;
use crate::storage::layout::StorageLayout;

/// Provisions table storage and guards the on-disk schema manifest.
///
/// `ensure_schema` is idempotent and runs on every process start. A
/// manifest that disagrees with the compiled-in schema is a fatal startup
/// error: continuing against a mismatched layout would silently corrupt
/// later reads.
pub struct SchemaManager;

impl SchemaManager {
    pub fn ensure_schema(layout: &StorageLayout, schema: &TableSchema) -> Result<()> {
        layout.ensure_table_dirs(&schema.name)?;

        let path = layout.schema_path(&schema.name);
        if path.exists() {
            let data = fs::read(&path)?;
            let existing: TableSchema = bincode::deserialize(&data)?;
            if existing != *schema {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!(
                        "schema manifest for table '{}' does not match (on disk v{}, expected v{})",
                        schema.name, existing.version, schema.version
                    ),
                ));
            }
            return Ok(());
        }

        let data = bincode::serialize(schema)?;
        fs::write(&path, data)?;
        Ok(())
    }
}
