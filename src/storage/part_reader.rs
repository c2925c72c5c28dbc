use std::fs::File;
use std::io::Read;

use chrono::DateTime;
use crc32fast::Hasher;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::StoredRecord;
use crate::schema::schema::TableSchema;
use crate::storage::layout::StorageLayout;
use crate::storage::part::{Part, PartHeader, PartId};

/// Load one part from disk, verifying format version and checksum before
/// trusting the payload.
pub fn read_part<R: StoredRecord>(
    layout: &StorageLayout,
    schema: &TableSchema,
    id: PartId,
) -> Result<Part<R>> {
    let path = layout.part_path(&schema.name, &id);
    let mut file = File::open(&path)?;

    let mut header_buf = vec![0u8; PartHeader::SIZE];
    file.read_exact(&mut header_buf)?;
    let header: PartHeader = bincode::deserialize(&header_buf)?;

    if header.version != PartHeader::VERSION {
        return Err(Error::new(
            ErrorKind::InvalidState,
            format!(
                "part {} has incompatible version {}",
                id.0, header.version
            ),
        ));
    }

    let mut payload = Vec::new();
    file.read_to_end(&mut payload)?;

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    if hasher.finalize() != header.checksum {
        return Err(Error::new(
            ErrorKind::Corrupted,
            format!("part {} failed checksum verification", id.0),
        ));
    }

    let raw = lz4_flex::decompress_size_prepended(&payload)?;
    let rows: Vec<R> = bincode::deserialize(&raw)?;

    if rows.len() != header.row_count as usize {
        return Err(Error::new(
            ErrorKind::Corrupted,
            format!(
                "part {} row count mismatch: header {}, payload {}",
                id.0,
                header.row_count,
                rows.len()
            ),
        ));
    }

    let created_at = DateTime::from_timestamp_millis(header.created_at_ms)
        .ok_or_else(|| Error::new(ErrorKind::Corrupted, "invalid part timestamp".to_string()))?;

    let mut part = Part::from_sorted_rows(schema, id, rows, created_at)?;
    part.meta.size_bytes = (PartHeader::SIZE + payload.len()) as u64;
    Ok(part)
}
