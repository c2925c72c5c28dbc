use serde::{Deserialize, Serialize};

/// Point-in-time counters for one table. Row counts are logical
/// (tombstoned rows excluded) but still include duplicate physical rows
/// that a future merge will fold, so treat them as approximate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    pub part_count: usize,
    pub physical_rows: u64,
    pub tombstoned_rows: u64,
    pub logical_rows: u64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub credentials: TableStats,
    pub cookies: TableStats,
}

impl StoreStats {
    pub fn total_logical_rows(&self) -> u64 {
        self.credentials.logical_rows + self.cookies.logical_rows
    }
}
