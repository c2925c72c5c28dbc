use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;

use crate::core::config::StoreConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::TableStats;
use crate::core::types::{Deadline, StoredRecord};
use crate::schema::schema::TableSchema;
use crate::storage::layout::StorageLayout;
use crate::storage::manifest::Manifest;
use crate::storage::merge_policy::{MergePolicy, TieredMergePolicy};
use crate::storage::part::{Part, PartId};
use crate::storage::part_reader::read_part;
use crate::storage::part_writer::write_part;

/// Wake-up messages for a table's merge worker.
pub enum MergeSignal {
    PartsChanged,
    Shutdown,
}

/// Immutable view of a table: the active parts plus their tombstone
/// bitmaps. Readers clone the `Arc` and scan without blocking writers.
pub struct TableState<R> {
    pub parts: Vec<Arc<Part<R>>>,
    pub tombstones: HashMap<PartId, Arc<RoaringBitmap>>,
}

impl<R: StoredRecord> TableState<R> {
    pub fn is_deleted(&self, part: &PartId, ordinal: u32) -> bool {
        self.tombstones
            .get(part)
            .map(|bm| bm.contains(ordinal))
            .unwrap_or(false)
    }

    pub fn physical_rows(&self) -> u64 {
        self.parts.iter().map(|p| p.meta.row_count as u64).sum()
    }

    pub fn tombstoned_rows(&self) -> u64 {
        self.tombstones.values().map(|bm| bm.len()).sum()
    }

    /// Logical row count: tombstoned rows excluded, not-yet-merged
    /// duplicates still counted. Approximate until compaction.
    pub fn logical_rows(&self) -> u64 {
        self.physical_rows() - self.tombstoned_rows()
    }
}

/// One record table: an append-only set of immutable sorted parts.
///
/// Ingestion appends a part per batch; the merge worker folds duplicate
/// natural keys in the background (greatest `observed_at` wins); retention
/// marks rows in tombstone bitmaps that merges later reclaim. All reads go
/// through cheap copy-on-write snapshots.
pub struct Table<R: StoredRecord> {
    schema: TableSchema,
    layout: Arc<StorageLayout>,
    state: RwLock<Arc<TableState<R>>>,
    // Serializes merge and purge so neither sees the other's half-applied
    // state. Ingestion only appends and stays out of it.
    maintenance: Mutex<()>,
    merge_policy: Box<dyn MergePolicy>,
    merge_tx: Sender<MergeSignal>,
}

impl<R: StoredRecord> Table<R> {
    /// Load the table from its manifest, dropping any part file a crashed
    /// writer left behind without committing. Returns the receiver end of
    /// the merge channel for a worker to consume.
    pub fn open(
        schema: TableSchema,
        layout: Arc<StorageLayout>,
        config: &StoreConfig,
    ) -> Result<(Arc<Self>, Receiver<MergeSignal>)> {
        if schema.name != R::KIND.table_name() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!(
                    "schema '{}' does not store {} records",
                    schema.name,
                    R::KIND.table_name()
                ),
            ));
        }

        let manifest = Manifest::load(&layout, &schema.name)?;
        let active: Vec<PartId> = manifest.map(|m| m.parts).unwrap_or_default();

        Self::remove_orphan_files(&layout, &schema.name, &active)?;

        let mut parts = Vec::with_capacity(active.len());
        let mut tombstones = HashMap::new();
        for id in active {
            let part: Part<R> = read_part(&layout, &schema, id)?;
            if let Some(bitmap) = Self::load_tombstones(&layout, &schema.name, &id)? {
                tombstones.insert(id, Arc::new(bitmap));
            }
            parts.push(Arc::new(part));
        }

        let (merge_tx, merge_rx) = unbounded();

        let table = Arc::new(Table {
            schema,
            layout,
            state: RwLock::new(Arc::new(TableState { parts, tombstones })),
            maintenance: Mutex::new(()),
            merge_policy: Box::new(TieredMergePolicy {
                max_parts: config.max_parts,
                min_parts_to_merge: config.min_parts_to_merge,
                max_rows_per_merge: config.max_rows_per_merge,
                small_part_rows: config.small_part_rows,
            }),
            merge_tx,
        });

        Ok((table, merge_rx))
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn snapshot(&self) -> Arc<TableState<R>> {
        self.state.read().clone()
    }

    /// Append one batch as a new part. The batch becomes visible only
    /// once the manifest commit lands, so any failure leaves the table
    /// unchanged and the whole batch retryable.
    pub fn ingest(&self, rows: Vec<R>, deadline: &Deadline) -> Result<usize> {
        let accepted = rows.len();
        if accepted == 0 {
            return Ok(0);
        }

        deadline.check()?;
        let mut part = Part::build(&self.schema, rows)?;

        deadline.check()?;
        write_part(&self.layout, &self.schema.name, &mut part)?;

        {
            let mut state = self.state.write();
            let mut parts = state.parts.clone();
            parts.push(Arc::new(part));

            let ids: Vec<PartId> = parts.iter().map(|p| p.id).collect();
            Manifest::new(ids).save(&self.layout, &self.schema.name)?;

            *state = Arc::new(TableState {
                parts,
                tombstones: state.tombstones.clone(),
            });
        }

        self.notify_merge();
        Ok(accepted)
    }

    /// One policy-driven merge round. Returns whether a merge ran, so the
    /// worker can keep folding until the policy is satisfied.
    pub fn maybe_merge(&self) -> Result<bool> {
        let _guard = self.maintenance.lock();

        let snapshot = self.snapshot();
        let metas: Vec<_> = snapshot.parts.iter().map(|p| p.meta.clone()).collect();
        if !self.merge_policy.should_merge(&metas) {
            return Ok(false);
        }

        let picked: Vec<PartId> = self
            .merge_policy
            .select(&metas)
            .into_iter()
            .map(|i| snapshot.parts[i].id)
            .collect();
        if picked.len() < 2 {
            return Ok(false);
        }

        self.merge_parts(&snapshot, &picked)?;
        Ok(true)
    }

    /// Fold every part into one, reclaiming tombstoned rows. This is the
    /// synchronous equivalent of letting the background merge run to
    /// completion.
    pub fn compact(&self) -> Result<()> {
        let _guard = self.maintenance.lock();

        let snapshot = self.snapshot();
        if snapshot.parts.is_empty() {
            return Ok(());
        }

        let all: Vec<PartId> = snapshot.parts.iter().map(|p| p.id).collect();
        self.merge_parts(&snapshot, &all)
    }

    /// Mark rows with `observed_at` strictly older than `cutoff` as
    /// deleted. Physical space is reclaimed by the next merge; until then
    /// the rows only disappear from logical reads and counts.
    pub fn mark_deleted_older_than(
        &self,
        cutoff: DateTime<Utc>,
        deadline: &Deadline,
    ) -> Result<u64> {
        let _guard = self.maintenance.lock();

        let snapshot = self.snapshot();
        let mut tombstones = snapshot.tombstones.clone();
        let mut removed = 0u64;

        for part in &snapshot.parts {
            deadline.check()?;
            if part.meta.min_observed_at >= cutoff {
                continue;
            }

            let mut bitmap = tombstones
                .get(&part.id)
                .map(|bm| (**bm).clone())
                .unwrap_or_default();
            let before = bitmap.len();

            for (ordinal, row) in part.rows.iter().enumerate() {
                if row.observed_at() < cutoff {
                    bitmap.insert(ordinal as u32);
                }
            }

            if bitmap.len() > before {
                removed += bitmap.len() - before;
                self.save_tombstones(&part.id, &bitmap)?;
                tombstones.insert(part.id, Arc::new(bitmap));
            }
        }

        if removed > 0 {
            let mut state = self.state.write();
            *state = Arc::new(TableState {
                parts: state.parts.clone(),
                tombstones,
            });
            drop(state);
            self.notify_merge();
        }

        Ok(removed)
    }

    pub fn stats(&self) -> TableStats {
        let snapshot = self.snapshot();
        TableStats {
            part_count: snapshot.parts.len(),
            physical_rows: snapshot.physical_rows(),
            tombstoned_rows: snapshot.tombstoned_rows(),
            logical_rows: snapshot.logical_rows(),
            size_bytes: snapshot.parts.iter().map(|p| p.meta.size_bytes).sum(),
        }
    }

    fn merge_parts(&self, snapshot: &TableState<R>, picked: &[PartId]) -> Result<()> {
        let picked_set: HashSet<PartId> = picked.iter().copied().collect();

        let mut rows = Vec::new();
        for part in &snapshot.parts {
            if !picked_set.contains(&part.id) {
                continue;
            }
            for (ordinal, row) in part.rows.iter().enumerate() {
                if !snapshot.is_deleted(&part.id, ordinal as u32) {
                    rows.push(row.clone());
                }
            }
        }

        let merged = if rows.is_empty() {
            None
        } else {
            let mut part = Part::build(&self.schema, rows)?;
            write_part(&self.layout, &self.schema.name, &mut part)?;
            Some(Arc::new(part))
        };

        {
            let mut state = self.state.write();
            let mut parts: Vec<Arc<Part<R>>> = state
                .parts
                .iter()
                .filter(|p| !picked_set.contains(&p.id))
                .cloned()
                .collect();
            if let Some(merged) = merged {
                parts.push(merged);
            }

            let mut tombstones = state.tombstones.clone();
            tombstones.retain(|id, _| !picked_set.contains(id));

            let ids: Vec<PartId> = parts.iter().map(|p| p.id).collect();
            Manifest::new(ids).save(&self.layout, &self.schema.name)?;

            *state = Arc::new(TableState { parts, tombstones });
        }

        for id in picked {
            let part_path = self.layout.part_path(&self.schema.name, id);
            if let Err(err) = fs::remove_file(&part_path) {
                tracing::warn!(part = %id.0, error = %err, "failed to remove merged part file");
            }
            let del_path = self.layout.tombstone_path(&self.schema.name, id);
            if del_path.exists() {
                let _ = fs::remove_file(del_path);
            }
        }

        Ok(())
    }

    fn notify_merge(&self) {
        let _ = self.merge_tx.send(MergeSignal::PartsChanged);
    }

    pub(crate) fn shutdown_sender(&self) -> Sender<MergeSignal> {
        self.merge_tx.clone()
    }

    fn save_tombstones(&self, id: &PartId, bitmap: &RoaringBitmap) -> Result<()> {
        let path = self.layout.tombstone_path(&self.schema.name, id);
        let tmp = path.with_extension("del.tmp");

        let mut data = Vec::with_capacity(bitmap.serialized_size());
        bitmap
            .serialize_into(&mut data)
            .map_err(|err| Error::new(ErrorKind::Io, err.to_string()))?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load_tombstones(
        layout: &StorageLayout,
        table: &str,
        id: &PartId,
    ) -> Result<Option<RoaringBitmap>> {
        let path = layout.tombstone_path(table, id);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let bitmap = RoaringBitmap::deserialize_from(&data[..])
            .map_err(|err| Error::new(ErrorKind::Corrupted, err.to_string()))?;
        Ok(Some(bitmap))
    }

    /// Drop part files a crashed writer created but never committed.
    fn remove_orphan_files(
        layout: &StorageLayout,
        table: &str,
        active: &[PartId],
    ) -> Result<()> {
        let parts_dir = layout.parts_dir(table);
        if !parts_dir.exists() {
            return Ok(());
        }

        let active_names: HashSet<String> =
            active.iter().map(|id| id.0.to_string()).collect();

        for entry in fs::read_dir(&parts_dir)? {
            let path = entry?.path();
            let is_part = path.extension().is_some_and(|ext| ext == "part");
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if is_part && !active_names.contains(stem) {
                tracing::warn!(file = %path.display(), "removing uncommitted part file");
                let _ = fs::remove_file(&path);
                let _ = fs::remove_file(path.with_extension("del"));
            }
        }

        Ok(())
    }
}
