use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDate, NaiveTime};
use futures::FutureExt;
use model::{RunPhase, RunReport, RunStats, RunStatus};
use storage::{ObjectStore, SharedStore};
use tokio::sync::mpsc;

use crate::calllog::CallLog;
use crate::pairs;
use crate::publisher::IncrementalPublisher;
use crate::worker::{now_seconds, HarvestOptions, HarvestPool, OfferSource, ProgressHook};
use crate::HarvestError;

#[derive(Debug, Clone)]
pub struct DailyRunOptions {
    pub target_date: NaiveDate,
    pub base_delay: f64,
    pub max_pairs: Option<usize>,
    pub workers: usize,
    pub upload: bool,
    /// publish a batch after every this many processed pairs; 0 disables
    /// incremental uploads (the final batch still runs).
    pub incremental_interval: usize,
    pub start_time: NaiveTime,
}

impl DailyRunOptions {
    pub fn new(target_date: NaiveDate) -> Self {
        Self {
            target_date,
            base_delay: 2.0,
            max_pairs: None,
            workers: 1,
            upload: true,
            incremental_interval: 100,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        }
    }

    /// Three pairs, one second of delay, no uploads.
    pub fn test_mode(target_date: NaiveDate) -> Self {
        Self {
            max_pairs: Some(3),
            base_delay: 1.0,
            upload: false,
            ..Self::new(target_date)
        }
    }
}

/// Composes the worker pool and the incremental publisher into one daily run
/// with an observable status.
///
/// At most one run is active at a time; a second start attempt is refused
/// without side effects. The status record is the only shared mutable state
/// and is only ever touched with plain field updates under its mutex.
pub struct Orchestrator {
    source: Arc<dyn OfferSource>,
    store: Option<SharedStore>,
    base_prefix: String,
    pairs_csv: PathBuf,
    output_root: PathBuf,
    call_log_path: Option<PathBuf>,
    status: Arc<StdMutex<RunStatus>>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn OfferSource>,
        store: Option<SharedStore>,
        base_prefix: impl Into<String>,
        pairs_csv: PathBuf,
        output_root: PathBuf,
    ) -> Self {
        Self {
            source,
            store,
            base_prefix: base_prefix.into(),
            pairs_csv,
            output_root,
            call_log_path: None,
            status: Arc::new(StdMutex::new(RunStatus::default())),
        }
    }

    pub fn with_call_log(mut self, path: PathBuf) -> Self {
        self.call_log_path = Some(path);
        self
    }

    /// Snapshot of the current run. Never blocks on I/O.
    pub fn status(&self) -> RunStatus {
        self.status.lock().unwrap().clone()
    }

    /// Runs a daily harvest to completion on the current task.
    pub async fn run_daily(&self, options: DailyRunOptions) -> Result<RunReport, HarvestError> {
        self.try_begin()?;
        self.run_begun(options).await
    }

    /// Starts a daily harvest on a background task so that status queries
    /// stay responsive. The conflict check happens before spawning.
    pub fn start(
        self: &Arc<Self>,
        options: DailyRunOptions,
    ) -> Result<tokio::task::JoinHandle<Result<RunReport, HarvestError>>, HarvestError> {
        self.try_begin()?;
        let orchestrator = self.clone();
        Ok(tokio::spawn(async move { orchestrator.run_begun(options).await }))
    }

    /// Verifies the run preconditions: readable pair list, creatable output
    /// directory and, when configured, a reachable object store.
    pub async fn health_check(&self) -> Result<(), HarvestError> {
        pairs::load_pairs(&self.pairs_csv)?;
        tokio::fs::create_dir_all(&self.output_root).await?;
        if let Some(store) = &self.store {
            let prefix = format!("{}/", self.base_prefix);
            let keys = store.list(&prefix).await?;
            log::info!("store reachable, {} objects under {}", keys.len(), prefix);
        }
        Ok(())
    }

    fn try_begin(&self) -> Result<(), HarvestError> {
        let mut status = self.status.lock().unwrap();
        if status.phase.is_active() {
            return Err(HarvestError::Conflict);
        }
        *status = RunStatus {
            phase: RunPhase::Starting,
            ..RunStatus::default()
        };
        Ok(())
    }

    fn update_status(&self, update: impl FnOnce(&mut RunStatus)) {
        let mut status = self.status.lock().unwrap();
        update(&mut status);
    }

    /// The run proper; `try_begin` must have succeeded already.
    async fn run_begun(&self, options: DailyRunOptions) -> Result<RunReport, HarvestError> {
        let started_at = now_seconds();
        self.update_status(|status| status.started_at = Some(started_at));

        let day_dir = self
            .output_root
            .join(options.target_date.format("%Y-%m-%d").to_string());
        let upload = options.upload && self.store.is_some();

        // incremental publisher, fed by nudges from the progress hook so
        // uploads never run on a worker task. A full channel just coalesces
        // nudges into the batch already pending.
        let (nudge, publisher) = if upload {
            let (tx, mut rx) = mpsc::channel::<()>(2);
            let store = self.store.clone().unwrap();
            let status = self.status.clone();
            let base_prefix = self.base_prefix.clone();
            let date = options.target_date;
            let dir = day_dir.clone();
            let handle = tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    let publisher =
                        IncrementalPublisher::new(store.as_ref(), &base_prefix, date, dir.clone());
                    match publisher.publish_batch().await {
                        Ok(batch) => {
                            let mut status = status.lock().unwrap();
                            status.upload_stats.incremental_batches += 1;
                            status.upload_stats.incremental_files_uploaded +=
                                batch.uploaded as u64;
                            status.upload_stats.attempts += batch.attempts as u64;
                            status.upload_stats.errors += batch.errors as u64;
                        }
                        Err(why) => {
                            log::error!("incremental upload failed: {}; harvest continues", why);
                            status.lock().unwrap().upload_stats.errors += 1;
                        }
                    }
                }
            });
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        // a paniced driver still runs the final batch and reports Failed
        let harvest_result =
            match AssertUnwindSafe(self.drive_harvest(&options, day_dir.clone(), nudge.clone()))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(why) => Err(HarvestError::Panicked(format!("{:?}", why))),
            };

        // close the nudge channel and wait for in-flight batches
        drop(nudge);
        if let Some(handle) = publisher {
            if let Err(why) = handle.await {
                log::error!("publisher task paniced: {:?}", why);
            }
        }

        // the final batch runs even when the harvest failed, best effort
        if upload {
            let store = self.store.clone().unwrap();
            let publisher = IncrementalPublisher::new(
                store.as_ref(),
                &self.base_prefix,
                options.target_date,
                day_dir,
            );
            match publisher.publish_batch().await {
                Ok(batch) => self.update_status(|status| {
                    status.upload_stats.final_files_uploaded += batch.uploaded as u64;
                    status.upload_stats.attempts += batch.attempts as u64;
                    status.upload_stats.errors += batch.errors as u64;
                }),
                Err(why) => {
                    log::error!("final upload batch failed: {}", why);
                    self.update_status(|status| status.upload_stats.errors += 1);
                }
            }
        }

        let ended_at = now_seconds();
        let upload_stats = self.status.lock().unwrap().upload_stats.clone();
        match harvest_result {
            Ok(stats) => {
                self.update_status(|status| {
                    status.phase = RunPhase::Completed;
                    status.ended_at = Some(ended_at);
                });
                Ok(RunReport {
                    started_at,
                    ended_at,
                    success: stats.is_acceptable(),
                    stats,
                    upload_stats,
                })
            }
            Err(why) => {
                let message = why.to_string();
                self.update_status(|status| {
                    status.phase = RunPhase::Failed;
                    status.ended_at = Some(ended_at);
                    status.last_error = Some(message);
                });
                Err(why)
            }
        }
    }

    async fn drive_harvest(
        &self,
        options: &DailyRunOptions,
        day_dir: PathBuf,
        nudge: Option<mpsc::Sender<()>>,
    ) -> Result<RunStats, HarvestError> {
        let pairs = pairs::load_pairs(&self.pairs_csv)?;
        let total = match options.max_pairs {
            Some(max_pairs) => pairs.len().min(max_pairs),
            None => pairs.len(),
        };
        self.update_status(|status| {
            status.phase = RunPhase::Running;
            status.total = total;
        });

        let mut harvest_options = HarvestOptions::new(options.target_date, day_dir);
        harvest_options.base_delay = options.base_delay;
        harvest_options.max_pairs = options.max_pairs;
        harvest_options.workers = options.workers;
        harvest_options.start_time = options.start_time;
        // hook on every completion: the status stays fresh and the hook
        // decides when a nudge is due.
        harvest_options.progress_interval = 1;

        let status = self.status.clone();
        let interval = options.incremental_interval;
        let hook: ProgressHook = Arc::new(move |processed, _total, _stats| {
            status.lock().unwrap().processed = processed;
            if interval > 0 && processed % interval == 0 {
                if let Some(nudge) = &nudge {
                    let _ = nudge.try_send(());
                }
            }
        });

        let mut pool = HarvestPool::new(self.source.clone());
        if let Some(path) = &self.call_log_path {
            match CallLog::open(path) {
                Ok(call_log) => pool = pool.with_call_log(Arc::new(call_log)),
                Err(why) => log::warn!("call log unavailable ({}), continuing without", why),
            }
        }

        pool.run(pairs, harvest_options, Some(hook)).await
    }
}
