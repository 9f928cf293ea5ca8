//! Defensive conversion of raw offer responses into itinerary records.
//! A malformed itinerary is skipped with a warning; it never fails the
//! surrounding observation.

use chrono::NaiveDateTime;
use model::{Itinerary, Leg};

use crate::offer::{RawLeg, RawRoute, RawTravelClass};

pub fn itineraries_from_response(route_values: &[serde_json::Value]) -> Vec<Itinerary> {
    let mut itineraries = vec![];
    for (index, value) in route_values.iter().enumerate() {
        match serde_json::from_value::<RawRoute>(value.clone()) {
            Ok(raw) => itineraries.push(itinerary_from_raw(raw)),
            Err(why) => {
                log::warn!("skipping malformed itinerary {}: {}", index, why);
            }
        }
    }
    itineraries
}

fn itinerary_from_raw(raw: RawRoute) -> Itinerary {
    let scheduled_departure = raw.departure.time;
    let scheduled_arrival = raw.arrival.time;
    let actual_departure = raw.departure.time_fact;
    let actual_arrival = raw.arrival.time_fact;

    let departure_delay = delay_minutes(scheduled_departure, actual_departure);
    let arrival_delay = delay_minutes(scheduled_arrival, actual_arrival);
    let delay_min = departure_delay.max(arrival_delay).max(raw.delay_min);

    let has_deviation = deviates(scheduled_departure, actual_departure)
        || deviates(scheduled_arrival, actual_arrival);

    let legs = raw
        .details
        .routes
        .into_iter()
        .enumerate()
        .map(|(index, leg)| leg_from_raw(index as u32 + 1, leg))
        .collect::<Vec<_>>();

    Itinerary {
        train_name: raw
            .details
            .train_full_name
            .unwrap_or_else(|| "Unknown".to_owned()),
        scheduled_departure,
        scheduled_arrival,
        actual_departure,
        actual_arrival,
        travel_time_min: raw.travel_time_min,
        delay_min,
        departure_delay_min: departure_delay,
        arrival_delay_min: arrival_delay,
        is_delayed: delay_min > 0 || has_deviation,
        is_significantly_delayed: delay_min > 5,
        transfers_count: raw.transfers_count,
        price_huf: price_of(&raw.travel_classes),
        services: raw
            .route_services
            .into_iter()
            .filter_map(|service| service.description)
            .collect(),
        intermediate_stations: intermediate_stations(&legs),
        route_segments: legs,
    }
}

fn leg_from_raw(leg_number: u32, raw: RawLeg) -> Leg {
    let scheduled_departure = raw.departure.time;
    let scheduled_arrival = raw.arrival.time;
    let actual_departure = raw.departure.time_fact;
    let actual_arrival = raw.arrival.time_fact;

    Leg {
        leg_number,
        train: train_identity(&raw),
        from_station: raw
            .start_station
            .name
            .unwrap_or_else(|| "Unknown".to_owned()),
        to_station: raw
            .destination_station
            .name
            .unwrap_or_else(|| "Unknown".to_owned()),
        departure_delay_min: delay_minutes(scheduled_departure, actual_departure),
        arrival_delay_min: delay_minutes(scheduled_arrival, actual_arrival),
        travel_time_min: match (scheduled_departure, scheduled_arrival) {
            (Some(departure), Some(arrival)) => (arrival - departure).num_minutes(),
            _ => 0,
        },
        scheduled_departure,
        actual_departure,
        scheduled_arrival,
        actual_arrival,
        services: raw
            .services
            .train
            .into_iter()
            .filter_map(|service| service.description)
            .collect(),
    }
}

/// Minutes of delay between a scheduled and an actual instant. A missing
/// actual time means the delay is zero, not unknown.
fn delay_minutes(scheduled: Option<NaiveDateTime>, actual: Option<NaiveDateTime>) -> i64 {
    match (scheduled, actual) {
        (Some(scheduled), Some(actual)) => (actual - scheduled).num_minutes(),
        _ => 0,
    }
}

fn deviates(scheduled: Option<NaiveDateTime>, actual: Option<NaiveDateTime>) -> bool {
    matches!((scheduled, actual), (Some(scheduled), Some(actual)) if scheduled != actual)
}

fn train_identity(raw: &RawLeg) -> String {
    let number = raw
        .train_details
        .train_number
        .clone()
        .unwrap_or_else(|| "Unknown".to_owned());
    match &raw.train_details.name {
        Some(name) if !name.is_empty() => format!("{} ({})", number, name),
        _ => number,
    }
}

/// Second-class price when offered, otherwise the first listed class.
fn price_of(travel_classes: &[RawTravelClass]) -> Option<i64> {
    travel_classes
        .iter()
        .find(|class| class.name == "2")
        .or_else(|| travel_classes.first())
        .and_then(|class| class.price.amount)
}

/// Stations passed between the origin and the final destination, in leg
/// order, without repeats.
fn intermediate_stations(legs: &[Leg]) -> Vec<String> {
    let mut stations = vec![];
    for leg in legs.iter().take(legs.len().saturating_sub(1)) {
        let station = leg.to_station.clone();
        if station != "Unknown" && !stations.contains(&station) {
            stations.push(station);
        }
    }
    stations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offer_route(dep_fact: &str, arr_fact: &str) -> serde_json::Value {
        json!({
            "departure": {"time": "2025-08-01T08:00:00+02:00", "timeFact": dep_fact},
            "arrival": {"time": "2025-08-01T10:00:00+02:00", "timeFact": arr_fact},
            "delayMin": 0,
            "travelTimeMin": 120,
            "transfersCount": 1,
            "travelClasses": [
                {"name": "1", "price": {"amount": 5990}},
                {"name": "2", "price": {"amount": 3950}}
            ],
            "routeServices": [{"description": "seat reservation"}],
            "details": {
                "trainFullName": "IC 910 (Napfény)",
                "routes": [
                    {
                        "trainDetails": {"name": "Napfény", "trainNumber": "910"},
                        "startStation": {"name": "A"},
                        "destionationStation": {"name": "X"},
                        "departure": {"time": "2025-08-01T08:00:00+02:00",
                                      "timeFact": dep_fact},
                        "arrival": {"time": "2025-08-01T09:00:00+02:00"},
                        "services": {"train": [{"description": "wifi"}]}
                    },
                    {
                        "trainDetails": {"trainNumber": "911"},
                        "startStation": {"name": "X"},
                        "destionationStation": {"name": "B"},
                        "departure": {"time": "2025-08-01T09:10:00+02:00"},
                        "arrival": {"time": "2025-08-01T10:00:00+02:00",
                                    "timeFact": arr_fact}
                    }
                ]
            }
        })
    }

    #[test]
    fn delays_come_from_fact_times() {
        let values = vec![offer_route(
            "2025-08-01T08:07:00+02:00",
            "2025-08-01T10:03:00+02:00",
        )];
        let itineraries = itineraries_from_response(&values);
        assert_eq!(itineraries.len(), 1);

        let itinerary = &itineraries[0];
        assert_eq!(itinerary.departure_delay_min, 7);
        assert_eq!(itinerary.arrival_delay_min, 3);
        assert_eq!(itinerary.delay_min, 7);
        assert!(itinerary.is_delayed);
        assert!(itinerary.is_significantly_delayed);
        assert_eq!(itinerary.price_huf, Some(3950));
        assert_eq!(itinerary.intermediate_stations, vec!["X".to_owned()]);

        assert_eq!(itinerary.route_segments.len(), 2);
        assert_eq!(itinerary.route_segments[0].leg_number, 1);
        assert_eq!(itinerary.route_segments[0].train, "910 (Napfény)");
        assert_eq!(itinerary.route_segments[0].departure_delay_min, 7);
        assert_eq!(itinerary.route_segments[0].arrival_delay_min, 0);
        assert_eq!(itinerary.route_segments[1].leg_number, 2);
        assert_eq!(itinerary.route_segments[1].train, "911");
        assert_eq!(itinerary.route_segments[1].arrival_delay_min, 3);
    }

    #[test]
    fn sentinel_fact_times_mean_on_time() {
        let values = vec![offer_route(
            "0001-01-01T00:00:00+01:00",
            "0001-01-01T00:00:00+01:00",
        )];
        let itineraries = itineraries_from_response(&values);

        let itinerary = &itineraries[0];
        assert_eq!(itinerary.actual_departure, None);
        assert_eq!(itinerary.actual_arrival, None);
        assert_eq!(itinerary.delay_min, 0);
        assert!(!itinerary.is_delayed);
    }

    #[test]
    fn malformed_elements_are_skipped() {
        let values = vec![
            json!({"departure": "not an object"}),
            offer_route("0001-01-01T00:00:00+01:00", "0001-01-01T00:00:00+01:00"),
        ];
        let itineraries = itineraries_from_response(&values);
        assert_eq!(itineraries.len(), 1);
    }

    #[test]
    fn leg_chain_is_contiguous() {
        let values = vec![offer_route(
            "2025-08-01T08:01:00+02:00",
            "2025-08-01T10:01:00+02:00",
        )];
        let itineraries = itineraries_from_response(&values);
        let legs = &itineraries[0].route_segments;
        for window in legs.windows(2) {
            assert_eq!(window[0].to_station, window[1].from_station);
            assert_eq!(window[0].leg_number + 1, window[1].leg_number);
        }
    }
}
