use std::error;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use model::RouteGraph;
use serde::Serialize;
use storage::{keys, ObjectStore, StoreError};

pub mod joiner;
pub mod loader;
pub mod maps;
pub mod routes;
pub mod stats;

/// Derived analytics tables, in the order they are published.
pub const ANALYTIC_NAMES: [&str; 7] = [
    "quick_stats",
    "delay_histogram",
    "price_histogram",
    "route_analysis_summary",
    "delayed_routes",
    "expensive_routes",
    "late_trains_analysis",
];

pub const DELAY_AWARE_MAP: &str = "delay_aware_train_map";
pub const MAX_DELAY_MAP: &str = "max_delay_train_map";

#[derive(Debug, Clone)]
pub enum AnalyticsError {
    Store(StoreError),
    /// the look-back window was exhausted without finding any data.
    NoDataAvailable {
        target_date: NaiveDate,
        days_back: u32,
    },
    Io(Arc<std::io::Error>),
}

impl error::Error for AnalyticsError {}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalyticsError::Store(why) => write!(f, "store error: {}", why),
            AnalyticsError::NoDataAvailable {
                target_date,
                days_back,
            } => write!(
                f,
                "no harvest data within {} days back from {}",
                days_back, target_date
            ),
            AnalyticsError::Io(why) => write!(f, "io error: {}", why),
        }
    }
}

impl From<StoreError> for AnalyticsError {
    fn from(why: StoreError) -> Self {
        AnalyticsError::Store(why)
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(why: std::io::Error) -> Self {
        AnalyticsError::Io(Arc::new(why))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub effective_date: NaiveDate,
    pub observations: usize,
    pub pair_summaries: usize,
    pub segments: usize,
    pub published: Vec<String>,
}

/// Post-harvest stage: load the day, derive the tables and the two delay
/// maps, publish everything under the effective day's prefix. Derivations
/// are recomputed from scratch and overwrite their deterministic keys.
pub async fn publish_daily_analytics(
    store: &dyn ObjectStore,
    base_prefix: &str,
    target_date: NaiveDate,
    graph: &RouteGraph,
    max_days_back: u32,
) -> Result<AnalyticsReport, AnalyticsError> {
    let (effective_date, observations) =
        loader::load_day(store, base_prefix, target_date, max_days_back).await?;

    let summaries = joiner::pair_summaries(&observations);
    let segments = joiner::segment_delays(&summaries, graph);
    log::info!(
        "derived {} pair summaries and {} segment aggregates from {} observations",
        summaries.len(),
        segments.len(),
        observations.len(),
    );

    let mut published = vec![];
    for name in ANALYTIC_NAMES {
        let value = match name {
            "quick_stats" => serde_json::to_value(stats::quick_stats(&observations)),
            "delay_histogram" => serde_json::to_value(stats::delay_histogram(&observations)),
            "price_histogram" => serde_json::to_value(stats::price_histogram(&observations)),
            "route_analysis_summary" => {
                serde_json::to_value(stats::route_analysis_summary(&observations))
            }
            "delayed_routes" => serde_json::to_value(stats::delayed_routes(&observations, 10)),
            "expensive_routes" => serde_json::to_value(stats::expensive_routes(&observations, 10)),
            _ => serde_json::to_value(stats::late_trains_analysis(&observations, 20)),
        }
        .unwrap_or_default();

        let key = keys::analytics_key(base_prefix, effective_date, name);
        let bytes = serde_json::to_vec_pretty(&value).unwrap_or_default();
        store.put(&key, bytes, "application/json").await?;
        published.push(key);
    }

    for (name, metric) in [
        (DELAY_AWARE_MAP, maps::MapMetric::Mean),
        (MAX_DELAY_MAP, maps::MapMetric::Max),
    ] {
        let html = maps::render_map(graph, &segments, metric, effective_date);
        let key = keys::map_key(base_prefix, effective_date, name);
        store.put(&key, html.into_bytes(), "text/html").await?;
        published.push(key);
    }

    Ok(AnalyticsReport {
        effective_date,
        observations: observations.len(),
        pair_summaries: summaries.len(),
        segments: segments.len(),
        published,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::{Itinerary, Leg, Observation, Pattern, PatternStop, RailRoute, RouteInfo, StationPair};
    use storage::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    fn graph() -> RouteGraph {
        RouteGraph {
            routes: vec![RailRoute {
                id: "1:100".to_owned(),
                desc: "test".to_owned(),
                agency_name: "MÁV".to_owned(),
                long_name: "Test".to_owned(),
                short_name: "T".to_owned(),
                mode: "RAIL".to_owned(),
                route_type: 2,
                color: "2A5DB0".to_owned(),
                text_color: "FFFFFF".to_owned(),
                patterns: vec![Pattern {
                    id: "P1".to_owned(),
                    headsign: "B".to_owned(),
                    name: "to B".to_owned(),
                    stops: vec![
                        PatternStop {
                            raw_id: "1:A_0".to_owned(),
                            pure_id: "A".to_owned(),
                            name: "Alpha".to_owned(),
                            lat: 47.5,
                            lon: 19.0,
                        },
                        PatternStop {
                            raw_id: "1:B_0".to_owned(),
                            pure_id: "B".to_owned(),
                            name: "Beta".to_owned(),
                            lat: 46.5,
                            lon: 20.0,
                        },
                    ],
                }],
            }],
        }
    }

    async fn seed_observation(store: &MemoryStore) {
        let at = date().and_hms_opt(8, 0, 0).unwrap();
        let leg = Leg {
            leg_number: 1,
            train: "910".to_owned(),
            from_station: "Alpha".to_owned(),
            to_station: "Beta".to_owned(),
            scheduled_departure: None,
            actual_departure: None,
            departure_delay_min: 7,
            scheduled_arrival: None,
            actual_arrival: None,
            arrival_delay_min: 3,
            travel_time_min: 120,
            services: vec![],
        };
        let observation = Observation {
            success: true,
            timestamp: at,
            route_info: RouteInfo {
                start_station: "A".to_owned(),
                end_station: "B".to_owned(),
                travel_date: date(),
                start_time: Some("08:00".to_owned()),
            },
            statistics: None,
            routes: vec![Itinerary {
                train_name: "IC 910".to_owned(),
                scheduled_departure: None,
                scheduled_arrival: None,
                actual_departure: None,
                actual_arrival: None,
                travel_time_min: 120,
                delay_min: 7,
                departure_delay_min: 7,
                arrival_delay_min: 3,
                is_delayed: true,
                is_significantly_delayed: true,
                transfers_count: 0,
                price_huf: Some(3950),
                services: vec![],
                intermediate_stations: vec![],
                route_segments: vec![leg],
            }],
            total_routes: 1,
        };
        let pair = StationPair::new("A", "B");
        let key = keys::blob_key("base", date(), &keys::bulk_blob_name(&pair, at));
        store
            .put(
                &key,
                serde_json::to_vec(&observation).unwrap(),
                "application/json",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publishes_all_tables_and_both_maps() {
        let store = MemoryStore::new();
        seed_observation(&store).await;

        let report = publish_daily_analytics(&store, "base", date(), &graph(), 8)
            .await
            .unwrap();

        assert_eq!(report.effective_date, date());
        assert_eq!(report.observations, 1);
        assert_eq!(report.pair_summaries, 1);
        assert_eq!(report.segments, 1);
        assert_eq!(report.published.len(), ANALYTIC_NAMES.len() + 2);

        for name in ANALYTIC_NAMES {
            assert!(store.contains(&format!("base/2025-08-01/{}.json", name)).await);
        }
        assert!(store.contains("base/2025-08-01/maps/delay_aware_train_map.html").await);
        assert!(store.contains("base/2025-08-01/maps/max_delay_train_map.html").await);
    }

    #[tokio::test]
    async fn rerunning_overwrites_with_identical_bytes() {
        let store = MemoryStore::new();
        seed_observation(&store).await;

        publish_daily_analytics(&store, "base", date(), &graph(), 8)
            .await
            .unwrap();
        let before = store.get("base/2025-08-01/quick_stats.json").await.unwrap();

        publish_daily_analytics(&store, "base", date(), &graph(), 8)
            .await
            .unwrap();
        let after = store.get("base/2025-08-01/quick_stats.json").await.unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn no_data_in_window_is_an_error() {
        let store = MemoryStore::new();
        let result = publish_daily_analytics(&store, "base", date(), &graph(), 3).await;
        assert!(matches!(
            result,
            Err(AnalyticsError::NoDataAvailable { days_back: 3, .. })
        ));
    }
}
