use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};

use crate::core::error::Result;
use crate::core::types::StoredRecord;
use crate::table::table::{MergeSignal, Table};

/// Background merge worker: one per table.
///
/// Waits on the table's merge channel and runs policy-driven merge rounds
/// until the policy is satisfied, so duplicate natural keys and tombstoned
/// rows fold without blocking ingestion or reads. A failed round is logged
/// and retried on the next signal.
pub struct MergeWorker {
    tx: Sender<MergeSignal>,
    handle: Option<JoinHandle<()>>,
}

impl MergeWorker {
    pub fn spawn<R: StoredRecord>(
        table: Arc<Table<R>>,
        rx: Receiver<MergeSignal>,
    ) -> Result<Self> {
        let tx = table.shutdown_sender();
        let name = table.schema().name.clone();

        let handle = std::thread::Builder::new()
            .name(format!("merge-{}", name))
            .spawn(move || {
                while let Ok(signal) = rx.recv() {
                    match signal {
                        MergeSignal::Shutdown => break,
                        MergeSignal::PartsChanged => loop {
                            match table.maybe_merge() {
                                Ok(true) => {
                                    tracing::debug!(table = %name, "merged parts");
                                }
                                Ok(false) => break,
                                Err(err) => {
                                    tracing::error!(table = %name, error = %err, "background merge failed");
                                    break;
                                }
                            }
                        },
                    }
                }
            })?;

        Ok(MergeWorker {
            tx,
            handle: Some(handle),
        })
    }

    /// Ask the worker to exit and wait for it.
    pub fn stop(&mut self) {
        let _ = self.tx.send(MergeSignal::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MergeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
