//! Joins per-pair delay observations onto the static route graph.
//!
//! The loader owns the raw observations; everything here consumes them
//! read-only and produces fresh value records.

use indexmap::IndexMap;
use model::{Observation, PairDaySummary, RouteGraph, SegmentDelay, StationPair};

/// Per-pair delay summaries over one day's dataset.
///
/// Every leg of every itinerary contributes its departure and arrival delay;
/// only strictly positive values count as delay samples. A pair whose
/// observations carry no legs at all yields no summary.
pub fn pair_summaries(observations: &[Observation]) -> Vec<PairDaySummary> {
    let mut delays_by_pair: IndexMap<StationPair, Vec<i64>> = IndexMap::new();
    for observation in observations {
        let delays = delays_by_pair.entry(observation.pair()).or_default();
        for itinerary in &observation.routes {
            for leg in &itinerary.route_segments {
                delays.push(leg.departure_delay_min);
                delays.push(leg.arrival_delay_min);
            }
        }
    }

    delays_by_pair
        .into_iter()
        .filter(|(_, delays)| !delays.is_empty())
        .map(|(pair, delays)| {
            let positive = delays
                .into_iter()
                .filter(|delay| *delay > 0)
                .collect::<Vec<_>>();
            let max_delay_min = positive.iter().copied().max().unwrap_or(0);
            let mean_delay_min = if positive.is_empty() {
                0.0
            } else {
                positive.iter().sum::<i64>() as f64 / positive.len() as f64
            };
            PairDaySummary {
                pair,
                max_delay_min,
                mean_delay_min,
                sample_count: positive.len() as u64,
            }
        })
        .collect()
}

struct SegmentAccumulator {
    from_station: String,
    to_station: String,
    max: i64,
    mean_sum: f64,
    contributions: u64,
    weighted_sum: f64,
    samples: u64,
}

/// Projects the pair summaries onto every pattern that covers them.
///
/// A pattern covers a pair when the origin occurs before the destination in
/// the pattern's native order; the earliest origin occurrence and the
/// earliest later destination occurrence delimit the covered span. Each
/// covering pattern aggregates independently; there is no cross-pattern
/// mixing and no reverse-orientation matching.
pub fn segment_delays(summaries: &[PairDaySummary], graph: &RouteGraph) -> Vec<SegmentDelay> {
    let mut accumulators: IndexMap<(String, usize), SegmentAccumulator> = IndexMap::new();

    for (_, pattern) in graph.patterns() {
        if pattern.stops.len() < 2 {
            continue;
        }
        for summary in summaries {
            let Some((start, end)) =
                pattern.span(&summary.pair.origin, &summary.pair.destination)
            else {
                continue;
            };
            for index in start..end {
                let accumulator = accumulators
                    .entry((pattern.id.clone(), index))
                    .or_insert_with(|| SegmentAccumulator {
                        from_station: pattern.stops[index].pure_id.clone(),
                        to_station: pattern.stops[index + 1].pure_id.clone(),
                        max: 0,
                        mean_sum: 0.0,
                        contributions: 0,
                        weighted_sum: 0.0,
                        samples: 0,
                    });
                // strict comparison keeps the first encountered maximum
                if summary.max_delay_min > accumulator.max {
                    accumulator.max = summary.max_delay_min;
                }
                accumulator.mean_sum += summary.mean_delay_min;
                accumulator.contributions += 1;
                accumulator.weighted_sum +=
                    summary.mean_delay_min * summary.sample_count as f64;
                accumulator.samples += summary.sample_count;
            }
        }
    }

    accumulators
        .into_iter()
        .map(|((pattern_id, index), accumulator)| SegmentDelay {
            pattern_id,
            index,
            from_station: accumulator.from_station,
            to_station: accumulator.to_station,
            max_delay_min: accumulator.max,
            mean_delay_min: accumulator.mean_sum / accumulator.contributions as f64,
            weighted_mean_delay_min: if accumulator.samples == 0 {
                0.0
            } else {
                accumulator.weighted_sum / accumulator.samples as f64
            },
            sample_count: accumulator.samples,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::{Itinerary, Leg, Pattern, PatternStop, RailRoute, RouteInfo};

    fn leg(number: u32, departure_delay: i64, arrival_delay: i64) -> Leg {
        Leg {
            leg_number: number,
            train: "910".to_owned(),
            from_station: "A".to_owned(),
            to_station: "B".to_owned(),
            scheduled_departure: None,
            actual_departure: None,
            departure_delay_min: departure_delay,
            scheduled_arrival: None,
            actual_arrival: None,
            arrival_delay_min: arrival_delay,
            travel_time_min: 60,
            services: vec![],
        }
    }

    fn observation(origin: &str, destination: &str, legs: Vec<Leg>) -> Observation {
        let itinerary = Itinerary {
            train_name: "IC".to_owned(),
            scheduled_departure: None,
            scheduled_arrival: None,
            actual_departure: None,
            actual_arrival: None,
            travel_time_min: 0,
            delay_min: 0,
            departure_delay_min: 0,
            arrival_delay_min: 0,
            is_delayed: false,
            is_significantly_delayed: false,
            transfers_count: 0,
            price_huf: None,
            services: vec![],
            intermediate_stations: vec![],
            route_segments: legs,
        };
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
            routes: vec![itinerary],
            total_routes: 1,
        }
    }

    fn stop(id: &str) -> PatternStop {
        PatternStop {
            raw_id: format!("1:{id}_0"),
            pure_id: id.to_owned(),
            name: id.to_owned(),
            lat: 47.0,
            lon: 19.0,
        }
    }

    fn graph(patterns: Vec<(&str, Vec<&str>)>) -> RouteGraph {
        RouteGraph {
            routes: vec![RailRoute {
                id: "1:100".to_owned(),
                desc: "test line".to_owned(),
                agency_name: "MÁV".to_owned(),
                long_name: "Test".to_owned(),
                short_name: "T".to_owned(),
                mode: "RAIL".to_owned(),
                route_type: 2,
                color: "2A5DB0".to_owned(),
                text_color: "FFFFFF".to_owned(),
                patterns: patterns
                    .into_iter()
                    .map(|(id, stops)| Pattern {
                        id: id.to_owned(),
                        headsign: "test".to_owned(),
                        name: id.to_owned(),
                        stops: stops.into_iter().map(stop).collect(),
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn summary_over_positive_leg_delays_only() {
        let observations = vec![observation("A", "B", vec![leg(1, 7, 3)])];
        let summaries = pair_summaries(&observations);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].max_delay_min, 7);
        assert_eq!(summaries[0].mean_delay_min, 5.0);
        assert_eq!(summaries[0].sample_count, 2);
    }

    #[test]
    fn on_time_legs_make_a_zero_summary() {
        let observations = vec![observation("A", "B", vec![leg(1, 0, 0)])];
        let summaries = pair_summaries(&observations);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].max_delay_min, 0);
        assert_eq!(summaries[0].mean_delay_min, 0.0);
        assert_eq!(summaries[0].sample_count, 0);
    }

    #[test]
    fn early_arrivals_are_not_delay_samples() {
        let observations = vec![observation("A", "B", vec![leg(1, -4, 6)])];
        let summaries = pair_summaries(&observations);

        assert_eq!(summaries[0].sample_count, 1);
        assert_eq!(summaries[0].max_delay_min, 6);
        assert_eq!(summaries[0].mean_delay_min, 6.0);
    }

    #[test]
    fn pair_without_legs_yields_no_summary() {
        let observations = vec![observation("A", "B", vec![])];
        assert!(pair_summaries(&observations).is_empty());
    }

    #[test]
    fn summary_invariants_hold() {
        let observations = vec![
            observation("A", "B", vec![leg(1, 12, 0), leg(2, 3, 1)]),
            observation("C", "D", vec![leg(1, 0, 0)]),
        ];
        for summary in pair_summaries(&observations) {
            assert!(summary.max_delay_min as f64 >= summary.mean_delay_min);
            assert!(summary.mean_delay_min >= 0.0);
            if summary.sample_count == 0 {
                assert_eq!(summary.mean_delay_min, 0.0);
            }
        }
    }

    #[test]
    fn two_patterns_cover_the_same_pair_independently() {
        let graph = graph(vec![
            ("P1", vec!["A", "X", "B"]),
            ("P2", vec!["A", "Y", "Z", "B"]),
        ]);
        let summaries = vec![PairDaySummary {
            pair: StationPair::new("A", "B"),
            max_delay_min: 10,
            mean_delay_min: 10.0,
            sample_count: 1,
        }];

        let segments = segment_delays(&summaries, &graph);
        assert_eq!(segments.len(), 5);

        let p1 = segments
            .iter()
            .filter(|segment| segment.pattern_id == "P1")
            .collect::<Vec<_>>();
        assert_eq!(p1.len(), 2);
        assert!(p1.iter().all(|segment| segment.max_delay_min == 10));

        let p2 = segments
            .iter()
            .filter(|segment| segment.pattern_id == "P2")
            .collect::<Vec<_>>();
        assert_eq!(p2.len(), 3);
        assert!(p2.iter().all(|segment| segment.max_delay_min == 10));
        assert!(p2.iter().all(|segment| segment.mean_delay_min == 10.0));
    }

    #[test]
    fn uncovered_pairs_produce_no_segments() {
        let graph = graph(vec![("P1", vec!["A", "X", "B"])]);
        let summaries = vec![PairDaySummary {
            pair: StationPair::new("Q", "R"),
            max_delay_min: 30,
            mean_delay_min: 30.0,
            sample_count: 2,
        }];
        assert!(segment_delays(&summaries, &graph).is_empty());
    }

    #[test]
    fn reverse_orientation_is_not_matched() {
        let graph = graph(vec![("P1", vec!["A", "X", "B"])]);
        let summaries = vec![PairDaySummary {
            pair: StationPair::new("B", "A"),
            max_delay_min: 30,
            mean_delay_min: 30.0,
            sample_count: 2,
        }];
        assert!(segment_delays(&summaries, &graph).is_empty());
    }

    #[test]
    fn short_patterns_are_ignored() {
        let graph = graph(vec![("P1", vec!["A"])]);
        let summaries = vec![PairDaySummary {
            pair: StationPair::new("A", "A"),
            max_delay_min: 5,
            mean_delay_min: 5.0,
            sample_count: 1,
        }];
        assert!(segment_delays(&summaries, &graph).is_empty());
    }

    #[test]
    fn segment_max_is_the_supremum_and_mean_is_unweighted() {
        let graph = graph(vec![("P1", vec!["A", "B", "C"])]);
        let summaries = vec![
            PairDaySummary {
                pair: StationPair::new("A", "C"),
                max_delay_min: 10,
                mean_delay_min: 8.0,
                sample_count: 4,
            },
            PairDaySummary {
                pair: StationPair::new("A", "B"),
                max_delay_min: 20,
                mean_delay_min: 2.0,
                sample_count: 1,
            },
        ];

        let segments = segment_delays(&summaries, &graph);
        let first = segments
            .iter()
            .find(|segment| segment.from_station == "A" && segment.to_station == "B")
            .unwrap();
        assert_eq!(first.max_delay_min, 20);
        assert_eq!(first.mean_delay_min, 5.0);
        // weighted alternative leans toward the larger sample
        assert!((first.weighted_mean_delay_min - (8.0 * 4.0 + 2.0) / 5.0).abs() < 1e-9);
        assert_eq!(first.sample_count, 5);

        let second = segments
            .iter()
            .find(|segment| segment.from_station == "B" && segment.to_station == "C")
            .unwrap();
        assert_eq!(second.max_delay_min, 10);
        assert_eq!(second.mean_delay_min, 8.0);
    }

    #[test]
    fn rerunning_the_joiner_is_deterministic() {
        let graph = graph(vec![("P1", vec!["A", "B", "C"]), ("P2", vec!["B", "C"])]);
        let observations = vec![
            observation("A", "C", vec![leg(1, 9, 2)]),
            observation("B", "C", vec![leg(1, 0, 4)]),
        ];

        let first = serde_json::to_string(&segment_delays(
            &pair_summaries(&observations),
            &graph,
        ))
        .unwrap();
        let second = serde_json::to_string(&segment_delays(
            &pair_summaries(&observations),
            &graph,
        ))
        .unwrap();
        assert_eq!(first, second);
    }
}
