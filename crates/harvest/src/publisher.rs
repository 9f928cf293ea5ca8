use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use storage::{keys, ObjectStore, StoreError};

/// Counters for one publish batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub attempts: usize,
    pub uploaded: usize,
    pub errors: usize,
}

/// Mirrors the local day directory into the object store.
///
/// Blob keys are stable and `put` replaces by key, so sweeping the same
/// directory repeatedly is safe; files written while a batch is running are
/// picked up by the next one. Only the file currently in flight is held in
/// memory.
pub struct IncrementalPublisher<'a> {
    store: &'a dyn ObjectStore,
    base_prefix: String,
    date: NaiveDate,
    local_dir: PathBuf,
}

impl<'a> IncrementalPublisher<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        base_prefix: impl Into<String>,
        date: NaiveDate,
        local_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            base_prefix: base_prefix.into(),
            date,
            local_dir,
        }
    }

    /// Uploads every file currently in the day directory. Per-file failures
    /// are counted and skipped; only a failure to enumerate the directory
    /// abandons the batch (the final end-of-run batch re-attempts all files).
    pub async fn publish_batch(&self) -> Result<BatchStats, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.local_dir)
            .await
            .map_err(|why| StoreError::Transient(why.to_string()))?;

        let mut stats = BatchStats::default();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(why) => return Err(StoreError::Transient(why.to_string())),
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            stats.attempts += 1;
            let key = keys::blob_key(&self.base_prefix, self.date, filename);
            let upload = async {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|why| StoreError::Transient(why.to_string()))?;
                self.store.put(&key, bytes, "application/json").await
            };
            match upload.await {
                Ok(()) => stats.uploaded += 1,
                Err(why) => {
                    stats.errors += 1;
                    log::warn!("upload of {} failed: {}", key, why);
                }
            }
        }

        if stats.attempts > 0 {
            let ratio = stats.uploaded as f64 / stats.attempts as f64;
            if ratio < 0.8 {
                log::warn!(
                    "publish batch degraded: {}/{} files uploaded",
                    stats.uploaded,
                    stats.attempts,
                );
            } else {
                log::info!(
                    "publish batch: {}/{} files uploaded",
                    stats.uploaded,
                    stats.attempts,
                );
            }
        } else {
            log::info!("publish batch: nothing to upload");
        }
        Ok(stats)
    }
}
