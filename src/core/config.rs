use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,

    // Query limits
    pub max_page_size: u32,       // Hard clamp on search/profile page sizes
    pub top_sources: usize,       // Breadth of the source-distribution aggregate

    // Execution deadlines
    pub read_deadline: Duration,  // Search and profile reads
    pub write_deadline: Duration, // One ingestion batch
    pub purge_deadline: Duration, // Retention sweeps scan every part

    // Merge tuning
    pub max_parts: usize,         // Part count that forces a merge
    pub min_parts_to_merge: usize,
    pub max_rows_per_merge: u64,
    pub small_part_rows: u64,     // Parts below this row count are merge candidates
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("./data"),

            max_page_size: 100,
            top_sources: 10,

            read_deadline: Duration::from_secs(10),
            write_deadline: Duration::from_secs(30),
            purge_deadline: Duration::from_secs(300), // Purge scans at scale

            max_parts: 8,
            min_parts_to_merge: 2,
            max_rows_per_merge: 5_000_000,
            small_part_rows: 100_000,
        }
    }
}
