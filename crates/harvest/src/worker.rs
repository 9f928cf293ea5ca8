use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mav::{ApiError, MavApiClient, OfferRequest};
use model::{Observation, ObservationStats, RouteInfo, RunStats, StationPair};
use rand::Rng;
use tokio::sync::Mutex;

use crate::calllog::{CallLog, CallRecord};
use crate::politeness::politeness_delay;
use crate::HarvestError;

/// A single offer call is retried this many times on transport errors and
/// 5xx. 4xx and payload errors fail the attempt immediately.
const CALL_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// chance per attempt of presenting a different browser identity.
const IDENTITY_ROTATION_CHANCE: f64 = 0.1;

/// Source of offer responses. The production implementation is
/// [`MavApiClient`]; tests script their own.
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// One HTTP call, no retries.
    async fn fetch_offers(&self, request: &OfferRequest)
        -> Result<Vec<serde_json::Value>, ApiError>;

    async fn rotate_identity(&self) {}
}

#[async_trait]
impl OfferSource for MavApiClient {
    async fn fetch_offers(
        &self,
        request: &OfferRequest,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        MavApiClient::fetch_offers(self, request).await
    }

    async fn rotate_identity(&self) {
        self.rotate_user_agent().await;
    }
}

pub type ProgressHook = Arc<dyn Fn(usize, usize, RunStats) + Send + Sync>;

#[derive(Clone)]
pub struct HarvestOptions {
    pub travel_date: NaiveDate,
    /// requested departure time of day for every offer request.
    pub start_time: NaiveTime,
    pub base_delay: f64,
    pub max_pairs: Option<usize>,
    pub workers: usize,
    /// invoke the progress hook after every this many completed pairs;
    /// 0 disables it.
    pub progress_interval: usize,
    /// local day directory the blobs are written to.
    pub output_dir: PathBuf,
}

impl HarvestOptions {
    pub fn new(travel_date: NaiveDate, output_dir: PathBuf) -> Self {
        Self {
            travel_date,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            base_delay: 2.0,
            max_pairs: None,
            workers: 1,
            progress_interval: 0,
            output_dir,
        }
    }
}

/// Turns a pair list into one observation blob per pair, politely.
///
/// Pairs are dispatched in input order over a FIFO queue shared by all
/// workers; each pair is attempted exactly once per run. Workers share the
/// offer source (connection pool and cookies included).
pub struct HarvestPool {
    source: Arc<dyn OfferSource>,
    call_log: Option<Arc<CallLog>>,
}

impl HarvestPool {
    pub fn new(source: Arc<dyn OfferSource>) -> Self {
        Self {
            source,
            call_log: None,
        }
    }

    pub fn with_call_log(mut self, call_log: Arc<CallLog>) -> Self {
        self.call_log = Some(call_log);
        self
    }

    pub async fn run(
        &self,
        mut pairs: Vec<StationPair>,
        options: HarvestOptions,
        on_progress: Option<ProgressHook>,
    ) -> Result<RunStats, HarvestError> {
        if let Some(max_pairs) = options.max_pairs {
            pairs.truncate(max_pairs);
        }
        tokio::fs::create_dir_all(&options.output_dir).await?;

        let total = pairs.len();
        log::info!(
            "harvesting {} pairs for {} with {} worker(s), base delay {:.1}s",
            total,
            options.travel_date,
            options.workers.max(1),
            options.base_delay,
        );

        let progress = Arc::new(Progress {
            total,
            interval: options.progress_interval,
            hook: on_progress,
            stats: StdMutex::new(RunStats {
                total_pairs: total,
                ..RunStats::default()
            }),
        });
        let queue = Arc::new(Mutex::new(VecDeque::from(pairs)));

        let mut handles = vec![];
        for worker in 0..options.workers.max(1) {
            let source = self.source.clone();
            let call_log = self.call_log.clone();
            let queue = queue.clone();
            let progress = progress.clone();
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(worker, source, call_log, queue, progress, options).await;
            }));
        }
        for handle in handles {
            if let Err(why) = handle.await {
                log::error!("worker paniced: {:?}", why);
            }
        }

        let stats = progress.snapshot();
        log::info!(
            "harvest finished: {}/{} successful, {} failed",
            stats.successful,
            stats.processed,
            stats.failed,
        );
        Ok(stats)
    }
}

struct Progress {
    total: usize,
    interval: usize,
    hook: Option<ProgressHook>,
    stats: StdMutex<RunStats>,
}

impl Progress {
    /// Registers one terminal pair attempt. The counters and the `processed`
    /// value handed to the hook come from the same critical section.
    fn complete(&self, success: bool) {
        let (processed, snapshot) = {
            let mut stats = self.stats.lock().unwrap();
            stats.processed += 1;
            if success {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            (stats.processed, stats.clone())
        };

        if self.interval > 0 && processed % self.interval == 0 {
            if let Some(hook) = &self.hook {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    hook(processed, self.total, snapshot);
                }));
                if result.is_err() {
                    log::error!("progress callback paniced; continuing");
                }
            }
        }
    }

    fn snapshot(&self) -> RunStats {
        self.stats.lock().unwrap().clone()
    }
}

async fn worker_loop(
    worker: usize,
    source: Arc<dyn OfferSource>,
    call_log: Option<Arc<CallLog>>,
    queue: Arc<Mutex<VecDeque<StationPair>>>,
    progress: Arc<Progress>,
    options: HarvestOptions,
) {
    let mut first = true;
    loop {
        let pair = queue.lock().await.pop_front();
        let Some(pair) = pair else {
            break;
        };
        if !first {
            if let Some(delay) = politeness_delay(options.base_delay) {
                tokio::time::sleep(delay).await;
            }
        }
        first = false;

        let success =
            attempt_pair(worker, source.as_ref(), call_log.as_deref(), &pair, &options).await;
        progress.complete(success);
    }
}

/// One attempt for one pair: Pending -> InFlight -> (Succeeded | Failed).
/// Success writes exactly one blob; failure writes nothing. A call record is
/// emitted either way.
async fn attempt_pair(
    worker: usize,
    source: &dyn OfferSource,
    call_log: Option<&CallLog>,
    pair: &StationPair,
    options: &HarvestOptions,
) -> bool {
    if rand::thread_rng().gen_bool(IDENTITY_ROTATION_CHANCE) {
        source.rotate_identity().await;
    }

    let request = OfferRequest::new(pair, options.travel_date, options.start_time);
    let started_at = now_seconds();
    let outcome = fetch_with_retries(source, &request).await;
    let ended_at = now_seconds();
    let duration_ms = (ended_at - started_at).num_milliseconds();

    match outcome {
        Ok(route_values) => {
            let routes = mav::parse::itineraries_from_response(&route_values);
            let observation = Observation {
                success: true,
                timestamp: ended_at,
                route_info: RouteInfo {
                    start_station: pair.origin.clone(),
                    end_station: pair.destination.clone(),
                    travel_date: options.travel_date,
                    start_time: Some(options.start_time.format("%H:%M").to_string()),
                },
                statistics: Some(ObservationStats::from_itineraries(&routes)),
                total_routes: routes.len(),
                routes,
            };

            let routes_found = observation.total_routes;
            match write_blob(&observation, pair, ended_at, options).await {
                Ok(filename) => {
                    log::info!(
                        "worker {}: {} ok, {} routes in {}ms -> {}",
                        worker,
                        pair,
                        routes_found,
                        duration_ms,
                        filename,
                    );
                    emit_record(
                        call_log, started_at, ended_at, duration_ms, pair, options, true,
                        routes_found, None, None,
                    );
                    true
                }
                Err(why) => {
                    log::error!("worker {}: could not write blob for {}: {}", worker, pair, why);
                    emit_record(
                        call_log,
                        started_at,
                        ended_at,
                        duration_ms,
                        pair,
                        options,
                        false,
                        0,
                        None,
                        Some(("io".to_owned(), why.to_string())),
                    );
                    false
                }
            }
        }
        Err(why) => {
            log::warn!(
                "worker {}: {} failed after {}ms: {}",
                worker,
                pair,
                duration_ms,
                why,
            );
            let status_code = why.status_code();
            emit_record(
                call_log,
                started_at,
                ended_at,
                duration_ms,
                pair,
                options,
                false,
                0,
                status_code,
                Some((why.kind().to_owned(), why.to_string())),
            );
            false
        }
    }
}

async fn write_blob(
    observation: &Observation,
    pair: &StationPair,
    captured_at: NaiveDateTime,
    options: &HarvestOptions,
) -> Result<String, HarvestError> {
    let filename = storage::keys::bulk_blob_name(pair, captured_at);
    let bytes = serde_json::to_vec_pretty(observation)?;
    tokio::fs::write(options.output_dir.join(&filename), bytes).await?;
    Ok(filename)
}

#[allow(clippy::too_many_arguments)]
fn emit_record(
    call_log: Option<&CallLog>,
    started_at: NaiveDateTime,
    ended_at: NaiveDateTime,
    duration_ms: i64,
    pair: &StationPair,
    options: &HarvestOptions,
    success: bool,
    routes_found: usize,
    status_code: Option<u16>,
    error: Option<(String, String)>,
) {
    let Some(call_log) = call_log else {
        return;
    };
    let (error_kind, error_message) = match error {
        Some((kind, message)) => (Some(kind), Some(message)),
        None => (None, None),
    };
    call_log.record(&CallRecord {
        started_at,
        ended_at,
        duration_ms,
        start_station: pair.origin.clone(),
        end_station: pair.destination.clone(),
        travel_date: options.travel_date,
        success,
        routes_found,
        status_code,
        error_kind,
        error_message,
    });
}

async fn fetch_with_retries(
    source: &dyn OfferSource,
    request: &OfferRequest,
) -> Result<Vec<serde_json::Value>, ApiError> {
    let mut attempt = 0;
    loop {
        match source.fetch_offers(request).await {
            Ok(values) => return Ok(values),
            Err(why) if why.is_retryable() && attempt < CALL_RETRIES => {
                attempt += 1;
                log::warn!("offer call failed ({}), retry {}/{}", why, attempt, CALL_RETRIES);
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(why) => return Err(why),
        }
    }
}

pub(crate) fn now_seconds() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
