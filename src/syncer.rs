//! Sync writer - patches changed rollup totals back to the remote store
//!
//! Only parent records (non-empty subtask relation) are candidates: a leaf's
//! stored value already equals its own estimate. Updates are independent and
//! keyed by distinct record ids, so they are dispatched through a bounded
//! worker pool and joined to completion before the run reports its summary.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::record::Record;
use crate::record_store::{RecordStore, RemoteError};
use crate::rollup::RollupCache;

/// Outcome counts for one sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Updates issued and acknowledged.
    pub updated: usize,
    /// Parents whose stored total already matched the computed rollup.
    pub skipped: usize,
    /// Updates dropped after the retry policy was exhausted.
    pub failed: usize,
}

/// Compare every parent record's stored total against the computed rollup
/// and patch the mismatches.
///
/// A failing update never fails the run; it is logged and counted in the
/// report.
pub async fn sync_estimates(
    store: Arc<dyn RecordStore>,
    records: &[Record],
    cache: &RollupCache,
    max_writers: usize,
    retry_wait: Duration,
) -> SyncReport {
    let mut report = SyncReport::default();

    let permits = Arc::new(Semaphore::new(max_writers.max(1)));
    let mut tasks: JoinSet<bool> = JoinSet::new();

    for record in records.iter().filter(|r| r.is_parent()) {
        let current = record.estimate.unwrap_or(0.0);
        let Some(target) = cache.get(&record.id) else {
            // Every submitted record gets cached by the rollup pass; an
            // uncached parent means the caller skipped that pass.
            log::warn!("No rollup total for {}, skipping", record.id);
            continue;
        };

        if current == target {
            report.skipped += 1;
            continue;
        }

        let store = store.clone();
        let permits = permits.clone();
        let record_id = record.id.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.expect("semaphore closed");
            update_with_retry(store.as_ref(), &record_id, target, retry_wait).await
        });
    }

    // Join-on-drain: the completion message must not outrun the writes.
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => report.updated += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                log::error!("Update task panicked: {}", e);
                report.failed += 1;
            }
        }
    }

    report
}

/// Issue one update; on a rate-limit rejection wait and retry exactly once.
async fn update_with_retry(
    store: &dyn RecordStore,
    record_id: &str,
    total: f64,
    retry_wait: Duration,
) -> bool {
    match store.update_estimate(record_id, total).await {
        Ok(()) => {
            log::debug!("Updated {} -> {}", record_id, total);
            true
        }
        Err(RemoteError::RateLimited) => {
            log::info!("Rate limited updating {}, retrying in {:?}", record_id, retry_wait);
            tokio::time::sleep(retry_wait).await;
            match store.update_estimate(record_id, total).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Dropping update for {} after retry: {}", record_id, e);
                    false
                }
            }
        }
        Err(e) => {
            log::warn!("Update failed for {}: {}", record_id, e);
            false
        }
    }
}
