//! Raw mirror of the offer response. The payload is loosely typed and varies
//! across itineraries, so every field defaults and actual-time fields pass
//! through the sentinel-aware parser.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::time::optional_time;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    /// itinerary elements are kept as raw values so that a single malformed
    /// entry can be skipped instead of failing the whole response.
    pub route: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRoute {
    pub departure: RawEvent,
    pub arrival: RawEvent,
    pub delay_min: i64,
    pub travel_time_min: i64,
    pub transfers_count: i64,
    pub travel_classes: Vec<RawTravelClass>,
    pub route_services: Vec<RawService>,
    pub details: RawDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEvent {
    #[serde(deserialize_with = "optional_time::deserialize")]
    pub time: Option<NaiveDateTime>,
    #[serde(deserialize_with = "optional_time::deserialize")]
    pub time_expected: Option<NaiveDateTime>,
    #[serde(deserialize_with = "optional_time::deserialize")]
    pub time_fact: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTravelClass {
    pub name: String,
    pub price: RawPrice,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPrice {
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawService {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDetails {
    pub train_full_name: Option<String>,
    pub routes: Vec<RawLeg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLeg {
    pub train_details: RawTrainDetails,
    pub start_station: RawStation,
    /// the upstream API misspells this field; the rename is deliberate.
    #[serde(rename = "destionationStation")]
    pub destination_station: RawStation,
    pub departure: RawEvent,
    pub arrival: RawEvent,
    pub services: RawLegServices,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTrainDetails {
    pub name: Option<String>,
    pub train_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStation {
    pub name: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLegServices {
    pub train: Vec<RawService>,
}
