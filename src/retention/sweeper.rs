use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::core::error::Result;
use crate::core::store::BreachStore;
use crate::core::types::Deadline;

/// Outcome of one retention sweep. Remaining counts are logical (purged
/// rows excluded) but still approximate until the next merge folds
/// duplicates and reclaims the tombstoned rows physically.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub success: bool,
    pub removed_credentials: u64,
    pub removed_cookies: u64,
    pub remaining_credentials: u64,
    pub remaining_cookies: u64,
    pub remaining_total: u64,
}

/// Deletes records older than the configured horizon from both tables.
///
/// Runs out of band on an external schedule, never on the request path.
/// A purge marks rows in tombstone bitmaps; disk space comes back on the
/// store's own merge schedule. Failures are logged and surfaced to the
/// caller, which owns retry and backoff policy.
pub struct RetentionSweeper {
    store: Arc<BreachStore>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<BreachStore>) -> Self {
        RetentionSweeper { store }
    }

    pub fn purge_older_than(&self, days: u32) -> Result<PurgeReport> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let deadline = Deadline::new(self.store.config().purge_deadline);

        let removed_credentials = self
            .store
            .credentials()
            .mark_deleted_older_than(cutoff, &deadline)
            .inspect_err(|err| {
                tracing::error!(error = %err, days, "credential purge failed");
            })?;

        let removed_cookies = self
            .store
            .cookies()
            .mark_deleted_older_than(cutoff, &deadline)
            .inspect_err(|err| {
                tracing::error!(error = %err, days, "cookie purge failed");
            })?;

        let stats = self.store.stats();
        let report = PurgeReport {
            success: true,
            removed_credentials,
            removed_cookies,
            remaining_credentials: stats.credentials.logical_rows,
            remaining_cookies: stats.cookies.logical_rows,
            remaining_total: stats.total_logical_rows(),
        };

        tracing::debug!(
            removed = removed_credentials + removed_cookies,
            remaining = report.remaining_total,
            days,
            "retention sweep complete"
        );

        Ok(report)
    }
}
