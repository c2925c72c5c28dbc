use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::StoreConfig;
use crate::core::error::Result;
use crate::core::stats::StoreStats;
use crate::core::types::{CookieRecord, CredentialRecord};
use crate::schema::manager::SchemaManager;
use crate::schema::schema::TableSchema;
use crate::storage::layout::StorageLayout;
use crate::table::merger::MergeWorker;
use crate::table::table::Table;

/// Composition root for the breach-record store.
///
/// Owns the storage layout, both record tables, and their merge workers.
/// Constructed explicitly and shared as `Arc<BreachStore>` by the
/// ingestion writer, query engine, profile resolver, and retention
/// sweeper; there is no global client. Schema provisioning runs here and
/// a failure is fatal: starting against a broken schema would corrupt
/// every later read.
pub struct BreachStore {
    config: StoreConfig,
    credentials: Arc<Table<CredentialRecord>>,
    cookies: Arc<Table<CookieRecord>>,
    workers: Mutex<Vec<MergeWorker>>,
}

impl BreachStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let layout = Arc::new(StorageLayout::new(config.data_dir.clone())?);

        let credential_schema = TableSchema::credentials();
        let cookie_schema = TableSchema::cookies();
        SchemaManager::ensure_schema(&layout, &credential_schema)?;
        SchemaManager::ensure_schema(&layout, &cookie_schema)?;

        let (credentials, credential_rx) =
            Table::open(credential_schema, layout.clone(), &config)?;
        let (cookies, cookie_rx) = Table::open(cookie_schema, layout.clone(), &config)?;

        let workers = vec![
            MergeWorker::spawn(credentials.clone(), credential_rx)?,
            MergeWorker::spawn(cookies.clone(), cookie_rx)?,
        ];

        Ok(BreachStore {
            config,
            credentials,
            cookies,
            workers: Mutex::new(workers),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Table<CredentialRecord> {
        &self.credentials
    }

    pub fn cookies(&self) -> &Table<CookieRecord> {
        &self.cookies
    }

    /// Fold both tables down to one part each, reclaiming tombstones.
    /// The synchronous form of what the background workers do over time;
    /// used by operators and tests that need post-compaction semantics.
    pub fn compact(&self) -> Result<()> {
        self.credentials.compact()?;
        self.cookies.compact()?;
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            credentials: self.credentials.stats(),
            cookies: self.cookies.stats(),
        }
    }
}

impl Drop for BreachStore {
    fn drop(&mut self) {
        for worker in self.workers.lock().iter_mut() {
            worker.stop();
        }
    }
}
