use std::fs::File;
use std::io::Write;

use crc32fast::Hasher;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::StoredRecord;
use crate::storage::layout::StorageLayout;
use crate::storage::part::{Part, PartHeader};

// [ HEADER (version, row_count, checksum, timestamps) ] <- byte 0
// [ LZ4 PAYLOAD (bincode row vec) ]
pub fn write_part<R: StoredRecord>(
    layout: &StorageLayout,
    table: &str,
    part: &mut Part<R>,
) -> Result<()> {
    let raw = bincode::serialize(&part.rows)?;
    if raw.len() > u32::MAX as usize {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("part payload of {} bytes exceeds format limit", raw.len()),
        ));
    }

    let payload = lz4_flex::compress_prepend_size(&raw);

    let mut hasher = Hasher::new();
    hasher.update(&payload);

    let header = PartHeader {
        version: PartHeader::VERSION,
        row_count: part.meta.row_count,
        checksum: hasher.finalize(),
        raw_len: raw.len() as u32,
        created_at_ms: part.meta.created_at.timestamp_millis(),
        min_observed_ms: part.meta.min_observed_at.timestamp_millis(),
        max_observed_ms: part.meta.max_observed_at.timestamp_millis(),
    };
    let header_data = bincode::serialize(&header)?;

    let path = layout.part_path(table, &part.id);
    let mut file = File::create(&path)?;
    file.write_all(&header_data)?;
    file.write_all(&payload)?;
    file.sync_all()?;

    part.meta.size_bytes = (header_data.len() + payload.len()) as u64;
    Ok(())
}
