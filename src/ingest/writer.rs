use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::Result;
use crate::core::store::BreachStore;
use crate::core::types::Deadline;
use crate::normalize::normalizer::{normalize_cookie, normalize_credential};

/// Outcome of one ingestion batch.
///
/// `rejected` counts records that were structurally invalid and skipped
/// individually; everything counted in `inserted` landed atomically. An
/// `Err` from the writer means the store itself failed and the entire
/// batch must be retried; duplicates from the retry fold away under the
/// natural-key merge.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub inserted: usize,
    pub rejected: usize,
}

/// Writes feed batches into the store: normalize, then one part per
/// batch. Stateless per call; share one writer per process.
pub struct IngestionWriter {
    store: Arc<BreachStore>,
}

impl IngestionWriter {
    pub fn new(store: Arc<BreachStore>) -> Self {
        IngestionWriter { store }
    }

    pub fn ingest_credentials(&self, records: &[Value], source_name: &str) -> Result<IngestReport> {
        let ingested_at = Utc::now();
        let deadline = Deadline::new(self.store.config().write_deadline);

        let mut rows = Vec::with_capacity(records.len());
        let mut rejected = 0usize;
        for record in records {
            match normalize_credential(record, source_name, ingested_at) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    tracing::warn!(source = source_name, error = %err, "rejected credential record");
                    rejected += 1;
                }
            }
        }

        let inserted = self.store.credentials().ingest(rows, &deadline)?;
        Ok(IngestReport {
            success: true,
            inserted,
            rejected,
        })
    }

    pub fn ingest_cookies(&self, records: &[Value], source_name: &str) -> Result<IngestReport> {
        let ingested_at = Utc::now();
        let deadline = Deadline::new(self.store.config().write_deadline);

        let mut rows = Vec::with_capacity(records.len());
        let mut rejected = 0usize;
        for record in records {
            match normalize_cookie(record, source_name, ingested_at) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    tracing::warn!(source = source_name, error = %err, "rejected cookie record");
                    rejected += 1;
                }
            }
        }

        let inserted = self.store.cookies().ingest(rows, &deadline)?;
        Ok(IngestReport {
            success: true,
            inserted,
            rejected,
        })
    }
}
