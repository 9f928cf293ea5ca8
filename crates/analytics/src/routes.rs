//! Parsing of pre-fetched route geometry files into the route graph.
//!
//! The files come from a separate fetcher; one JSON document per route with
//! the route's metadata and its stop patterns.

use std::path::Path;

use model::{Pattern, PatternStop, RailRoute, RouteGraph};
use serde::Deserialize;

use crate::AnalyticsError;

#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default)]
    data: RouteData,
}

#[derive(Debug, Default, Deserialize)]
struct RouteData {
    route: Option<RawRoute>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRoute {
    id: String,
    desc: String,
    agency: RawAgency,
    long_name: String,
    short_name: String,
    mode: String,
    #[serde(rename = "type")]
    route_type: i32,
    color: String,
    text_color: String,
    patterns: Vec<RawPattern>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAgency {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPattern {
    id: String,
    headsign: String,
    name: String,
    stops: Vec<RawStop>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawStop {
    id: String,
    lat: f64,
    lon: f64,
    name: String,
}

/// Strips the feed prefix and platform suffix from a raw stop id:
/// `"1:005514449_0"` becomes `"005514449"`. Ids in any other shape pass
/// through unchanged.
pub fn pure_station_id(raw_id: &str) -> String {
    raw_id
        .split(':')
        .nth(1)
        .and_then(|rest| rest.split('_').next())
        .unwrap_or(raw_id)
        .to_owned()
}

pub fn parse_route(bytes: &[u8]) -> Result<Option<RailRoute>, serde_json::Error> {
    let file: RouteFile = serde_json::from_slice(bytes)?;
    let Some(raw) = file.data.route else {
        return Ok(None);
    };
    Ok(Some(RailRoute {
        id: raw.id,
        desc: raw.desc,
        agency_name: raw.agency.name,
        long_name: raw.long_name,
        short_name: raw.short_name,
        mode: raw.mode,
        route_type: raw.route_type,
        color: raw.color,
        text_color: raw.text_color,
        patterns: raw
            .patterns
            .into_iter()
            .map(|pattern| Pattern {
                id: pattern.id,
                headsign: pattern.headsign,
                name: pattern.name,
                stops: pattern
                    .stops
                    .into_iter()
                    .map(|stop| PatternStop {
                        pure_id: pure_station_id(&stop.id),
                        raw_id: stop.id,
                        name: stop.name,
                        lat: stop.lat,
                        lon: stop.lon,
                    })
                    .collect(),
            })
            .collect(),
    }))
}

/// Loads every `*.json` route file in a directory. Files that fail to parse
/// are skipped with a warning.
pub async fn load_route_graph(dir: &Path) -> Result<RouteGraph, AnalyticsError> {
    let mut graph = RouteGraph::default();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
            continue;
        }
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(why) => {
                log::warn!("could not read {}: {}", path.display(), why);
                continue;
            }
        };
        match parse_route(&bytes) {
            Ok(Some(route)) => graph.routes.push(route),
            Ok(None) => log::warn!("{} has no route payload", path.display()),
            Err(why) => log::warn!("could not parse {}: {}", path.display(), why),
        }
    }
    log::info!(
        "loaded {} routes with {} patterns from {}",
        graph.routes.len(),
        graph.patterns().count(),
        dir.display(),
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_feed_prefix_and_platform_suffix() {
        assert_eq!(pure_station_id("1:005514449_0"), "005514449");
        assert_eq!(pure_station_id("1:005514449"), "005514449");
        assert_eq!(pure_station_id("005514449"), "005514449");
    }

    #[test]
    fn parses_a_route_file() {
        let bytes = r#"{
            "data": {
                "route": {
                    "id": "1:1660",
                    "desc": "Budapest - Szeged",
                    "agency": {"name": "MÁV-START"},
                    "longName": "Napfény IC",
                    "shortName": "IC",
                    "mode": "RAIL",
                    "type": 2,
                    "color": "2A5DB0",
                    "textColor": "FFFFFF",
                    "patterns": [{
                        "id": "1:1660:0:01",
                        "headsign": "Szeged",
                        "name": "to Szeged",
                        "stops": [
                            {"id": "1:005510009_0", "lat": 47.5, "lon": 19.1, "name": "Budapest"},
                            {"id": "1:005517228_0", "lat": 46.9, "lon": 19.7, "name": "Kecskemét"},
                            {"id": "1:005517756_0", "lat": 46.25, "lon": 20.14, "name": "Szeged"}
                        ]
                    }]
                }
            }
        }"#;

        let route = parse_route(bytes.as_bytes()).unwrap().unwrap();
        assert_eq!(route.id, "1:1660");
        assert_eq!(route.agency_name, "MÁV-START");
        assert_eq!(route.patterns.len(), 1);
        assert_eq!(route.patterns[0].stops.len(), 3);
        assert_eq!(route.patterns[0].stops[0].pure_id, "005510009");
        assert_eq!(
            route.patterns[0].span("005510009", "005517756"),
            Some((0, 2))
        );
    }

    #[test]
    fn missing_route_payload_is_none() {
        assert!(parse_route(b"{\"data\": {}}").unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_a_directory_skipping_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("route_good.json"),
            br#"{"data": {"route": {"id": "r", "patterns": []}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("route_bad.json"), b"garbage").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"ignore me").unwrap();

        let graph = load_route_graph(dir.path()).await.unwrap();
        assert_eq!(graph.routes.len(), 1);
        assert_eq!(graph.routes[0].id, "r");
    }
}
