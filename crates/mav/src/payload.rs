use chrono::{NaiveDate, NaiveTime};
use model::StationPair;
use serde::Serialize;

/// The offer API expects travel dates with the site's fixed utc offset.
const TRAVEL_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+02:00";

/// Request body of `GetOfferRequest`. Field names (including the upstream's
/// own spelling of `passangers`) follow the public site's requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    pub offerkind: String,
    pub start_station_code: String,
    pub inner_stations_codes: Vec<String>,
    pub end_station_code: String,
    pub modalities: Vec<i32>,
    pub passangers: Vec<Passenger>,
    pub is_one_way_ticket: bool,
    pub is_travel_end_time: bool,
    pub is_supplementary_tickets_only: bool,
    pub has_hungary_pass: bool,
    pub travel_start_date: String,
    pub travel_return_date: String,
    pub selected_services: Vec<i32>,
    pub selected_search_services: Vec<String>,
    pub eszkoz_szamok: Vec<i64>,
    pub is_of_detailed_search: bool,
    pub is_from_time_table: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub passenger_count: i32,
    pub passenger_id: i32,
    pub customer_type_key: String,
    pub customer_discounts_keys: Vec<String>,
}

impl Passenger {
    /// One adult, standard fare.
    pub fn single_adult() -> Self {
        Self {
            passenger_count: 1,
            passenger_id: 0,
            customer_type_key: "HU_44_025-065".to_owned(),
            customer_discounts_keys: vec![],
        }
    }
}

impl OfferRequest {
    /// One-way offer request for one pair, departing at `start_time` on
    /// `travel_date`.
    pub fn new(pair: &StationPair, travel_date: NaiveDate, start_time: NaiveTime) -> Self {
        let travel_start_date = travel_date
            .and_time(start_time)
            .format(TRAVEL_DATE_FORMAT)
            .to_string();

        Self {
            offerkind: "1".to_owned(),
            start_station_code: pair.origin.clone(),
            inner_stations_codes: vec![],
            end_station_code: pair.destination.clone(),
            modalities: vec![100, 200, 109],
            passangers: vec![Passenger::single_adult()],
            is_one_way_ticket: true,
            is_travel_end_time: false,
            is_supplementary_tickets_only: false,
            has_hungary_pass: false,
            travel_return_date: travel_start_date.clone(),
            travel_start_date,
            selected_services: vec![52],
            selected_search_services: vec!["BUDAPESTI_HELYI_KOZLEKEDESSEL".to_owned()],
            eszkoz_szamok: vec![],
            is_of_detailed_search: false,
            is_from_time_table: false,
        }
    }
}
