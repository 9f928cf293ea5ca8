//! Per-day summary tables derived from the loaded dataset. The arithmetic
//! here is deliberately plain; the contract is deterministic output under a
//! deterministic key.

use indexmap::IndexMap;
use itertools::Itertools;
use model::{Itinerary, Observation, StationPair};
use serde::Serialize;

struct Row<'a> {
    pair: StationPair,
    itinerary: &'a Itinerary,
}

fn rows(observations: &[Observation]) -> Vec<Row<'_>> {
    observations
        .iter()
        .flat_map(|observation| {
            let pair = observation.pair();
            observation.routes.iter().map(move |itinerary| Row {
                pair: pair.clone(),
                itinerary,
            })
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected = values.collect::<Vec<_>>();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}

fn median(mut values: Vec<i64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[middle - 1] + values[middle]) as f64 / 2.0
    } else {
        values[middle] as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickStats {
    pub total_routes: usize,
    pub unique_station_pairs: usize,
    pub average_delay_min: f64,
    pub max_delay_min: i64,
    pub trains_on_time: usize,
    pub trains_delayed: usize,
    pub trains_significantly_delayed: usize,
    pub on_time_percentage: f64,
    pub average_price_huf: f64,
    pub average_travel_time_min: f64,
}

pub fn quick_stats(observations: &[Observation]) -> QuickStats {
    let rows = rows(observations);
    let total = rows.len();
    let delayed = rows.iter().filter(|row| row.itinerary.delay_min > 0).count();
    let on_time = total - delayed;

    QuickStats {
        total_routes: total,
        unique_station_pairs: rows.iter().map(|row| row.pair.clone()).unique().count(),
        average_delay_min: mean(rows.iter().map(|row| row.itinerary.delay_min as f64)),
        max_delay_min: rows
            .iter()
            .map(|row| row.itinerary.delay_min)
            .max()
            .unwrap_or(0),
        trains_on_time: on_time,
        trains_delayed: delayed,
        trains_significantly_delayed: rows
            .iter()
            .filter(|row| row.itinerary.is_significantly_delayed)
            .count(),
        on_time_percentage: if total == 0 {
            0.0
        } else {
            on_time as f64 / total as f64 * 100.0
        },
        average_price_huf: mean(
            rows.iter()
                .filter_map(|row| row.itinerary.price_huf)
                .map(|price| price as f64),
        ),
        average_travel_time_min: mean(rows.iter().map(|row| row.itinerary.travel_time_min as f64)),
    }
}

const DELAY_BINS: [(&str, i64, i64); 7] = [
    ("on time", i64::MIN, 0),
    ("1-5 min", 1, 5),
    ("6-10 min", 6, 10),
    ("11-20 min", 11, 20),
    ("21-30 min", 21, 30),
    ("31-60 min", 31, 60),
    ("60+ min", 61, i64::MAX),
];

/// Delay distribution over fixed bins, insertion order preserved.
pub fn delay_histogram(observations: &[Observation]) -> IndexMap<String, u64> {
    let rows = rows(observations);
    let mut histogram: IndexMap<String, u64> = DELAY_BINS
        .iter()
        .map(|(label, _, _)| (label.to_string(), 0))
        .collect();
    for row in &rows {
        let delay = row.itinerary.delay_min;
        for (label, low, high) in DELAY_BINS {
            if delay >= low && delay <= high {
                *histogram.entry(label.to_owned()).or_default() += 1;
                break;
            }
        }
    }
    histogram
}

const PRICE_BINS: [(&str, i64, i64); 5] = [
    ("0-1000 HUF", 0, 1000),
    ("1001-3000 HUF", 1001, 3000),
    ("3001-5000 HUF", 3001, 5000),
    ("5001-10000 HUF", 5001, 10000),
    ("10000+ HUF", 10001, i64::MAX),
];

/// Ticket price distribution; itineraries without a price are not counted.
pub fn price_histogram(observations: &[Observation]) -> IndexMap<String, u64> {
    let rows = rows(observations);
    let mut histogram: IndexMap<String, u64> = PRICE_BINS
        .iter()
        .map(|(label, _, _)| (label.to_string(), 0))
        .collect();
    for row in &rows {
        let Some(price) = row.itinerary.price_huf else {
            continue;
        };
        for (label, low, high) in PRICE_BINS {
            if price >= low && price <= high {
                *histogram.entry(label.to_owned()).or_default() += 1;
                break;
            }
        }
    }
    histogram
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteAnalysisSummary {
    pub total_routes: usize,
    pub unique_station_pairs: usize,
    pub total_delay_minutes: i64,
    pub average_delay_min: f64,
    pub max_delay_min: i64,
    pub most_delayed_pair: Option<StationPair>,
    pub average_price_huf: f64,
    pub most_expensive_route_huf: Option<i64>,
    pub average_transfers: f64,
    pub average_travel_time_min: f64,
}

pub fn route_analysis_summary(observations: &[Observation]) -> RouteAnalysisSummary {
    let rows = rows(observations);

    RouteAnalysisSummary {
        total_routes: rows.len(),
        unique_station_pairs: rows.iter().map(|row| row.pair.clone()).unique().count(),
        total_delay_minutes: rows.iter().map(|row| row.itinerary.delay_min.max(0)).sum(),
        average_delay_min: mean(rows.iter().map(|row| row.itinerary.delay_min as f64)),
        max_delay_min: rows
            .iter()
            .map(|row| row.itinerary.delay_min)
            .max()
            .unwrap_or(0),
        most_delayed_pair: rows
            .iter()
            .max_by_key(|row| row.itinerary.delay_min)
            .map(|row| row.pair.clone()),
        average_price_huf: mean(
            rows.iter()
                .filter_map(|row| row.itinerary.price_huf)
                .map(|price| price as f64),
        ),
        most_expensive_route_huf: rows.iter().filter_map(|row| row.itinerary.price_huf).max(),
        average_transfers: mean(rows.iter().map(|row| row.itinerary.transfers_count as f64)),
        average_travel_time_min: mean(rows.iter().map(|row| row.itinerary.travel_time_min as f64)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayedRoute {
    pub start_station: String,
    pub end_station: String,
    pub train_name: String,
    pub delay_min: i64,
    pub travel_time_min: i64,
    pub price_huf: Option<i64>,
}

/// Top N itineraries by overall delay, most delayed first.
pub fn delayed_routes(observations: &[Observation], top_n: usize) -> Vec<DelayedRoute> {
    rows(observations)
        .into_iter()
        .filter(|row| row.itinerary.delay_min > 0)
        .sorted_by_key(|row| std::cmp::Reverse(row.itinerary.delay_min))
        .take(top_n)
        .map(|row| DelayedRoute {
            start_station: row.pair.origin,
            end_station: row.pair.destination,
            train_name: row.itinerary.train_name.clone(),
            delay_min: row.itinerary.delay_min,
            travel_time_min: row.itinerary.travel_time_min,
            price_huf: row.itinerary.price_huf,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpensiveRoute {
    pub start_station: String,
    pub end_station: String,
    pub train_name: String,
    pub price_huf: i64,
    pub travel_time_min: i64,
}

/// Top N unique connections by ticket price. Uniqueness ignores direction so
/// a pair and its reverse count once.
pub fn expensive_routes(observations: &[Observation], top_n: usize) -> Vec<ExpensiveRoute> {
    let mut seen = std::collections::HashSet::new();
    rows(observations)
        .into_iter()
        .filter(|row| row.itinerary.price_huf.is_some())
        .sorted_by_key(|row| std::cmp::Reverse(row.itinerary.price_huf.unwrap_or(0)))
        .filter(|row| {
            let mut endpoints = [row.pair.origin.clone(), row.pair.destination.clone()];
            endpoints.sort();
            seen.insert(endpoints)
        })
        .take(top_n)
        .map(|row| ExpensiveRoute {
            start_station: row.pair.origin,
            end_station: row.pair.destination,
            train_name: row.itinerary.train_name.clone(),
            price_huf: row.itinerary.price_huf.unwrap_or(0),
            travel_time_min: row.itinerary.travel_time_min,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct LateTrainsAnalysis {
    pub threshold_min: i64,
    pub total_routes: usize,
    pub late_trains_count: usize,
    pub late_trains_pct_of_total: f64,
    pub average_delay_min: f64,
    pub median_delay_min: f64,
    pub min_delay_min: i64,
    pub max_delay_min: i64,
    pub average_travel_time_min: f64,
    pub average_transfers: f64,
    pub unique_routes_affected: usize,
}

/// Subset analysis of itineraries delayed beyond `threshold_min` minutes.
pub fn late_trains_analysis(observations: &[Observation], threshold_min: i64) -> LateTrainsAnalysis {
    let rows = rows(observations);
    let total = rows.len();
    let late = rows
        .iter()
        .filter(|row| row.itinerary.delay_min > threshold_min)
        .collect::<Vec<_>>();
    let delays = late
        .iter()
        .map(|row| row.itinerary.delay_min)
        .collect::<Vec<_>>();

    LateTrainsAnalysis {
        threshold_min,
        total_routes: total,
        late_trains_count: late.len(),
        late_trains_pct_of_total: if total == 0 {
            0.0
        } else {
            late.len() as f64 / total as f64 * 100.0
        },
        average_delay_min: mean(delays.iter().map(|delay| *delay as f64)),
        median_delay_min: median(delays.clone()),
        min_delay_min: delays.iter().copied().min().unwrap_or(0),
        max_delay_min: delays.iter().copied().max().unwrap_or(0),
        average_travel_time_min: mean(late.iter().map(|row| row.itinerary.travel_time_min as f64)),
        average_transfers: mean(late.iter().map(|row| row.itinerary.transfers_count as f64)),
        unique_routes_affected: late.iter().map(|row| row.pair.clone()).unique().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::RouteInfo;

    fn itinerary(delay: i64, price: Option<i64>, transfers: i64) -> Itinerary {
        Itinerary {
            train_name: format!("train {}", delay),
            scheduled_departure: None,
            scheduled_arrival: None,
            actual_departure: None,
            actual_arrival: None,
            travel_time_min: 100,
            delay_min: delay,
            departure_delay_min: delay,
            arrival_delay_min: 0,
            is_delayed: delay > 0,
            is_significantly_delayed: delay > 5,
            transfers_count: transfers,
            price_huf: price,
            services: vec![],
            intermediate_stations: vec![],
            route_segments: vec![],
        }
    }

    fn observation(origin: &str, destination: &str, routes: Vec<Itinerary>) -> Observation {
        let total_routes = routes.len();
        Observation {
            success: true,
            timestamp: NaiveDate::from_ymd_opt(2025, 8, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            route_info: RouteInfo {
                start_station: origin.to_owned(),
                end_station: destination.to_owned(),
                travel_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                start_time: None,
            },
            statistics: None,
            routes,
            total_routes,
        }
    }

    fn dataset() -> Vec<Observation> {
        vec![
            observation(
                "A",
                "B",
                vec![
                    itinerary(0, Some(2000), 0),
                    itinerary(7, Some(4000), 1),
                    itinerary(25, Some(12000), 2),
                ],
            ),
            observation("B", "A", vec![itinerary(40, Some(12000), 0)]),
            observation("C", "D", vec![itinerary(0, None, 0)]),
        ]
    }

    #[test]
    fn quick_stats_counts_and_means() {
        let stats = quick_stats(&dataset());
        assert_eq!(stats.total_routes, 5);
        assert_eq!(stats.unique_station_pairs, 3);
        assert_eq!(stats.max_delay_min, 40);
        assert_eq!(stats.trains_on_time, 2);
        assert_eq!(stats.trains_delayed, 3);
        assert_eq!(stats.trains_significantly_delayed, 3);
        assert!((stats.average_delay_min - 72.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn delay_histogram_buckets_every_route() {
        let histogram = delay_histogram(&dataset());
        assert_eq!(histogram["on time"], 2);
        assert_eq!(histogram["6-10 min"], 1);
        assert_eq!(histogram["21-30 min"], 1);
        assert_eq!(histogram["31-60 min"], 1);
        assert_eq!(histogram.values().sum::<u64>(), 5);
        // labels keep their declaration order
        assert_eq!(
            histogram.keys().next().map(String::as_str),
            Some("on time")
        );
    }

    #[test]
    fn price_histogram_skips_unknown_prices() {
        let histogram = price_histogram(&dataset());
        assert_eq!(histogram.values().sum::<u64>(), 4);
        assert_eq!(histogram["10000+ HUF"], 2);
    }

    #[test]
    fn delayed_routes_are_ranked_and_bounded() {
        let top = delayed_routes(&dataset(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].delay_min, 40);
        assert_eq!(top[1].delay_min, 25);
    }

    #[test]
    fn expensive_routes_dedup_unordered_pairs() {
        let top = expensive_routes(&dataset(), 10);
        // A-B and B-A both cost 12000 but count once
        assert_eq!(top[0].price_huf, 12000);
        let duplicates = top
            .iter()
            .filter(|route| {
                let mut endpoints = [route.start_station.clone(), route.end_station.clone()];
                endpoints.sort();
                endpoints == ["A".to_owned(), "B".to_owned()]
            })
            .count();
        assert_eq!(duplicates, 1);
    }

    #[test]
    fn late_trains_analysis_over_threshold() {
        let analysis = late_trains_analysis(&dataset(), 20);
        assert_eq!(analysis.late_trains_count, 2);
        assert_eq!(analysis.max_delay_min, 40);
        assert_eq!(analysis.min_delay_min, 25);
        assert_eq!(analysis.median_delay_min, 32.5);
        assert_eq!(analysis.unique_routes_affected, 2);
    }

    #[test]
    fn empty_dataset_is_all_zeroes() {
        let stats = quick_stats(&[]);
        assert_eq!(stats.total_routes, 0);
        assert_eq!(stats.average_delay_min, 0.0);
        let analysis = late_trains_analysis(&[], 20);
        assert_eq!(analysis.late_trains_count, 0);
        assert_eq!(analysis.median_delay_min, 0.0);
    }
}
