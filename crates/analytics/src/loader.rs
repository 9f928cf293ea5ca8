use std::collections::HashMap;

use chrono::NaiveDate;
use model::{Observation, StationPair};
use storage::keys::{self, BulkBlobName};
use storage::ObjectStore;

use crate::AnalyticsError;

pub const DEFAULT_LOOK_BACK_DAYS: u32 = 8;

/// Materializes the deduplicated dataset for a day.
///
/// Walks back from `target_date` one day at a time until a day yields
/// parseable observations. Within a day, only the chronologically latest
/// blob per ordered pair is used; later re-scrapes of a pair override
/// earlier ones. Foreign object names and unparseable blobs are skipped
/// with a warning. The order of the returned observations is unspecified.
pub async fn load_day(
    store: &dyn ObjectStore,
    base_prefix: &str,
    target_date: NaiveDate,
    max_days_back: u32,
) -> Result<(NaiveDate, Vec<Observation>), AnalyticsError> {
    for days_back in 0..max_days_back.max(1) {
        let date = target_date - chrono::Duration::days(days_back as i64);
        let prefix = keys::day_prefix(base_prefix, date);
        let listed = store.list(&prefix).await?;
        log::info!("trying {}: {} objects", date, listed.len());

        // latest blob per ordered pair, by the lexicographic timestamp
        // suffix of the blob name
        let mut latest: HashMap<StationPair, (String, String)> = HashMap::new();
        for key in listed {
            let filename = keys::filename_of(&key);
            match BulkBlobName::parse(filename) {
                Some(parsed) => {
                    let replace = latest
                        .get(&parsed.pair)
                        .map(|(timestamp, _)| parsed.timestamp > *timestamp)
                        .unwrap_or(true);
                    if replace {
                        latest.insert(parsed.pair, (parsed.timestamp, key));
                    }
                }
                None => log::warn!("skipping object with foreign name: {}", key),
            }
        }
        if latest.is_empty() {
            continue;
        }

        let mut observations = vec![];
        for (pair, (_, key)) in latest {
            let bytes = match store.get(&key).await {
                Ok(bytes) => bytes,
                Err(why) => {
                    log::warn!("skipping {} for {}: {}", key, pair, why);
                    continue;
                }
            };
            match serde_json::from_slice::<Observation>(&bytes) {
                Ok(observation) => observations.push(observation),
                Err(why) => log::warn!("skipping unparseable blob {}: {}", key, why),
            }
        }
        if observations.is_empty() {
            continue;
        }

        log::info!("loaded {} observations for {}", observations.len(), date);
        return Ok((date, observations));
    }

    Err(AnalyticsError::NoDataAvailable {
        target_date,
        days_back: max_days_back,
    })
}
