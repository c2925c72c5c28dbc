use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::types::StoredRecord;
use crate::index::membership::MembershipFilter;
use crate::index::set_index::SetIndex;
use crate::schema::schema::{SkipIndexKind, TableSchema};

/// Unique part identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartId(pub Uuid);

impl PartId {
    pub fn new() -> Self {
        PartId(Uuid::new_v4())
    }
}

impl Default for PartId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct PartMetadata {
    pub created_at: DateTime<Utc>,
    pub row_count: u32,
    pub size_bytes: u64,
    pub min_observed_at: DateTime<Utc>,
    pub max_observed_at: DateTime<Utc>,
}

/// Fixed-size part file header, written ahead of the compressed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartHeader {
    pub version: u32,
    pub row_count: u32,
    pub checksum: u32,
    pub raw_len: u32,
    pub created_at_ms: i64,
    pub min_observed_ms: i64,
    pub max_observed_ms: i64,
}

impl PartHeader {
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 40;
}

/// Skip indexes carried by one part, built per the table schema.
#[derive(Debug, Default)]
pub struct PartIndexes {
    pub membership: HashMap<String, MembershipFilter>,
    pub sets: HashMap<String, SetIndex>,
}

impl PartIndexes {
    /// Whether rows in this part can possibly carry `value` in `column`.
    /// Unindexed columns answer `true`.
    pub fn may_contain(&self, column: &str, value: &str) -> bool {
        if let Some(filter) = self.membership.get(column) {
            return filter.may_contain(value);
        }
        if let Some(set) = self.sets.get(column) {
            return set.contains(value);
        }
        true
    }
}

/// Immutable sorted run of rows.
///
/// A part is created whole: one per ingested batch, or one per merge.
/// Rows are sorted by natural key (domain-first) and already folded, so a
/// key appears at most once per part; duplicates only exist across parts
/// until a merge folds them too.
#[derive(Debug)]
pub struct Part<R> {
    pub id: PartId,
    pub meta: PartMetadata,
    pub rows: Vec<R>,
    pub indexes: PartIndexes,
}

impl<R: StoredRecord> Part<R> {
    /// Sort, fold duplicate natural keys (greatest `observed_at` wins),
    /// and index a batch of rows into a fresh part.
    pub fn build(schema: &TableSchema, mut rows: Vec<R>) -> Result<Self> {
        rows.sort_by_cached_key(|r| (r.natural_key(), Reverse(r.observed_at())));
        rows.dedup_by(|next, kept| next.natural_key() == kept.natural_key());

        Self::from_sorted_rows(schema, PartId::new(), rows, Utc::now())
    }

    /// Rebuild the in-memory part around rows already sorted and folded
    /// (the on-disk payload of a previously written part).
    pub fn from_sorted_rows(
        schema: &TableSchema,
        id: PartId,
        rows: Vec<R>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let min_observed_at = rows
            .iter()
            .map(|r| r.observed_at())
            .min()
            .unwrap_or(created_at);
        let max_observed_at = rows
            .iter()
            .map(|r| r.observed_at())
            .max()
            .unwrap_or(created_at);

        let indexes = Self::build_indexes(schema, &rows)?;

        Ok(Part {
            id,
            meta: PartMetadata {
                created_at,
                row_count: rows.len() as u32,
                size_bytes: 0,
                min_observed_at,
                max_observed_at,
            },
            rows,
            indexes,
        })
    }

    fn build_indexes(schema: &TableSchema, rows: &[R]) -> Result<PartIndexes> {
        let mut indexes = PartIndexes::default();

        for spec in &schema.indexes {
            match spec.kind {
                SkipIndexKind::Membership => {
                    let mut filter = MembershipFilter::with_capacity(rows.len());
                    for row in rows {
                        if let Some(value) = row.index_value(&spec.column) {
                            filter.insert(value);
                        }
                    }
                    indexes.membership.insert(spec.column.clone(), filter);
                }
                SkipIndexKind::Set => {
                    let terms: Vec<String> = rows
                        .iter()
                        .filter_map(|row| row.index_value(&spec.column))
                        .map(str::to_string)
                        .collect();
                    indexes.sets.insert(spec.column.clone(), SetIndex::build(terms)?);
                }
            }
        }

        Ok(indexes)
    }
}
