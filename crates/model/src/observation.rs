use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::pair::StationPair;

/// One harvest result for one station pair at one wall-clock instant.
/// This is the shape of a single `bulk_…` blob in the object store; it is
/// written once by the scraper and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub success: bool,

    /// capture instant, local wall clock, second resolution.
    pub timestamp: NaiveDateTime,

    pub route_info: RouteInfo,

    pub statistics: Option<ObservationStats>,

    /// proposed journeys, in the order the upstream API returned them.
    #[serde(default)]
    pub routes: Vec<Itinerary>,

    #[serde(default)]
    pub total_routes: usize,
}

impl Observation {
    pub fn pair(&self) -> StationPair {
        StationPair::new(
            self.route_info.start_station.clone(),
            self.route_info.end_station.clone(),
        )
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub start_station: String,
    pub end_station: String,
    pub travel_date: NaiveDate,
    pub start_time: Option<String>,
}

/// One candidate journey within an observation.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerary {
    pub train_name: String,

    pub scheduled_departure: Option<NaiveDateTime>,
    pub scheduled_arrival: Option<NaiveDateTime>,

    /// actual times are only present when the upstream reported a real
    /// `timeFact`; the sentinel value maps to `None`.
    pub actual_departure: Option<NaiveDateTime>,
    pub actual_arrival: Option<NaiveDateTime>,

    #[serde(default)]
    pub travel_time_min: i64,

    /// overall delay: max of departure delay, arrival delay and the
    /// upstream-reported `delayMin`.
    #[serde(default)]
    pub delay_min: i64,
    #[serde(default)]
    pub departure_delay_min: i64,
    #[serde(default)]
    pub arrival_delay_min: i64,

    #[serde(default)]
    pub is_delayed: bool,
    #[serde(default)]
    pub is_significantly_delayed: bool,

    #[serde(default)]
    pub transfers_count: i64,

    pub price_huf: Option<i64>,

    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub intermediate_stations: Vec<String>,

    #[serde(default)]
    pub route_segments: Vec<Leg>,
}

/// One train leg inside an itinerary. `leg_number` runs 1..N without gaps
/// and `to_station` of leg k equals `from_station` of leg k+1.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub leg_number: u32,

    pub train: String,

    pub from_station: String,
    pub to_station: String,

    pub scheduled_departure: Option<NaiveDateTime>,
    pub actual_departure: Option<NaiveDateTime>,
    #[serde(default)]
    pub departure_delay_min: i64,

    pub scheduled_arrival: Option<NaiveDateTime>,
    pub actual_arrival: Option<NaiveDateTime>,
    #[serde(default)]
    pub arrival_delay_min: i64,

    #[serde(default)]
    pub travel_time_min: i64,

    #[serde(default)]
    pub services: Vec<String>,
}

/// Per-observation delay statistics, computed at harvest time from the
/// upstream-reported overall delays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationStats {
    pub total_trains: usize,
    pub average_delay: f64,
    pub max_delay: i64,
    pub trains_on_time: usize,
    pub trains_delayed: usize,
    pub trains_significantly_delayed: usize,
    pub on_time_percentage: f64,
    pub delayed_percentage: f64,
}

impl ObservationStats {
    /// Gathers statistics over the overall delay of each itinerary.
    pub fn from_itineraries(routes: &[Itinerary]) -> Self {
        if routes.is_empty() {
            return Self::default();
        }

        let delays = routes.iter().map(|route| route.delay_min).collect::<Vec<_>>();
        let total = delays.len();
        let on_time = delays.iter().filter(|d| **d == 0).count();
        let delayed = delays.iter().filter(|d| **d > 0).count();
        let significantly = delays.iter().filter(|d| **d > 5).count();

        Self {
            total_trains: total,
            average_delay: delays.iter().sum::<i64>() as f64 / total as f64,
            max_delay: delays.iter().copied().max().unwrap_or(0),
            trains_on_time: on_time,
            trains_delayed: delayed,
            trains_significantly_delayed: significantly,
            on_time_percentage: on_time as f64 / total as f64 * 100.0,
            delayed_percentage: delayed as f64 / total as f64 * 100.0,
        }
    }
}
