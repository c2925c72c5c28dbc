use crate::storage::part::PartMetadata;

/// Policy for deciding when and which parts to merge.
///
/// Works on part metadata only so one boxed policy serves both tables.
/// `select` returns indices into the slice it was given.
pub trait MergePolicy: Send + Sync {
    fn should_merge(&self, parts: &[PartMetadata]) -> bool;

    fn select(&self, parts: &[PartMetadata]) -> Vec<usize>;
}

/// Tiered policy: merge once small parts pile up or the part count grows
/// past the configured ceiling, preferring the smallest parts first.
pub struct TieredMergePolicy {
    pub max_parts: usize,
    pub min_parts_to_merge: usize,
    pub max_rows_per_merge: u64,
    pub small_part_rows: u64,
}

impl Default for TieredMergePolicy {
    fn default() -> Self {
        TieredMergePolicy {
            max_parts: 8,
            min_parts_to_merge: 2,
            max_rows_per_merge: 5_000_000,
            small_part_rows: 100_000,
        }
    }
}

impl MergePolicy for TieredMergePolicy {
    fn should_merge(&self, parts: &[PartMetadata]) -> bool {
        if parts.len() > self.max_parts {
            return true;
        }

        let small_parts = parts
            .iter()
            .filter(|p| (p.row_count as u64) < self.small_part_rows)
            .count();

        small_parts >= self.min_parts_to_merge
    }

    fn select(&self, parts: &[PartMetadata]) -> Vec<usize> {
        let mut by_size: Vec<usize> = (0..parts.len()).collect();
        by_size.sort_by_key(|&i| parts[i].row_count);

        let mut selected = Vec::new();
        let mut total_rows = 0u64;

        for i in by_size {
            let rows = parts[i].row_count as u64;
            if total_rows + rows > self.max_rows_per_merge && !selected.is_empty() {
                break;
            }
            selected.push(i);
            total_rows += rows;
        }

        if selected.len() < self.min_parts_to_merge {
            Vec::new()
        } else {
            selected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(rows: u32) -> PartMetadata {
        PartMetadata {
            created_at: Utc::now(),
            row_count: rows,
            size_bytes: rows as u64 * 100,
            min_observed_at: Utc::now(),
            max_observed_at: Utc::now(),
        }
    }

    #[test]
    fn small_parts_trigger_merge() {
        let policy = TieredMergePolicy::default();
        assert!(!policy.should_merge(&[meta(10)]));
        assert!(policy.should_merge(&[meta(10), meta(20)]));

        let selected = policy.select(&[meta(10), meta(20)]);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn too_many_parts_trigger_merge() {
        let policy = TieredMergePolicy {
            small_part_rows: 1, // Nothing counts as small
            ..TieredMergePolicy::default()
        };
        let parts: Vec<PartMetadata> = (0..9).map(|_| meta(500_000)).collect();
        assert!(policy.should_merge(&parts));
        assert!(!policy.should_merge(&parts[..3]));
    }

    #[test]
    fn selection_respects_merge_row_limit() {
        let policy = TieredMergePolicy {
            max_rows_per_merge: 250,
            ..TieredMergePolicy::default()
        };
        // Smallest-first: 100 + 100 fit, the 200-row part does not
        let selected = policy.select(&[meta(200), meta(100), meta(100)]);
        assert_eq!(selected, vec![1, 2]);
    }
}
