use serde::{Deserialize, Serialize};

use crate::pair::StationPair;

/// Delay aggregate for one ordered station pair over one day, built from the
/// strictly positive leg delays of every itinerary observed for that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairDaySummary {
    pub pair: StationPair,
    pub max_delay_min: i64,
    pub mean_delay_min: f64,
    pub sample_count: u64,
}

/// Delay aggregate for one station-to-station segment of one pattern.
/// `index` is the position of the segment's first station within the
/// pattern's stop list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDelay {
    pub pattern_id: String,
    pub index: usize,

    pub from_station: String,
    pub to_station: String,

    pub max_delay_min: i64,

    /// unweighted mean over the contributing pair means. This matches the
    /// historical dashboard output; use `weighted_mean_delay_min` for a
    /// sample-weighted figure.
    pub mean_delay_min: f64,
    pub weighted_mean_delay_min: f64,

    pub sample_count: u64,
}
