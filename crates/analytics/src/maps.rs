//! Leaflet HTML rendering of the per-segment delay aggregates. The output is
//! a single self-contained document per map; no rendering library involved,
//! just the template below.

use std::collections::HashMap;

use chrono::NaiveDate;
use model::{Pattern, RouteGraph, SegmentDelay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMetric {
    /// mean delay per segment (the delay-aware map).
    Mean,
    /// maximum observed delay per segment.
    Max,
}

impl MapMetric {
    fn title(&self) -> &'static str {
        match self {
            MapMetric::Mean => "Average train delays",
            MapMetric::Max => "Maximum train delays",
        }
    }

    fn value(&self, segment: &SegmentDelay) -> f64 {
        match self {
            MapMetric::Mean => segment.mean_delay_min,
            MapMetric::Max => segment.max_delay_min as f64,
        }
    }

    /// Green to red ramp; the max map uses wider buckets because single
    /// outliers dominate it.
    fn color(&self, minutes: f64) -> &'static str {
        let thresholds: [f64; 4] = match self {
            MapMetric::Mean => [0.0, 2.0, 5.0, 10.0],
            MapMetric::Max => [0.0, 10.0, 20.0, 45.0],
        };
        if minutes <= thresholds[0] {
            "#00FF00"
        } else if minutes <= thresholds[1] {
            "#FFFF00"
        } else if minutes <= thresholds[2] {
            "#FFA500"
        } else if minutes <= thresholds[3] {
            "#FF6600"
        } else {
            "#FF0000"
        }
    }

    fn legend(&self) -> [(&'static str, &'static str); 5] {
        match self {
            MapMetric::Mean => [
                ("#00FF00", "on time"),
                ("#FFFF00", "≤ 2 min"),
                ("#FFA500", "≤ 5 min"),
                ("#FF6600", "≤ 10 min"),
                ("#FF0000", "> 10 min"),
            ],
            MapMetric::Max => [
                ("#00FF00", "on time"),
                ("#FFFF00", "≤ 10 min"),
                ("#FFA500", "≤ 20 min"),
                ("#FF6600", "≤ 45 min"),
                ("#FF0000", "> 45 min"),
            ],
        }
    }
}

/// Renders one delay map. Segments whose pattern is missing from the graph
/// are dropped; with no drawable segment the map still renders, centered on
/// the default view.
pub fn render_map(
    graph: &RouteGraph,
    segments: &[SegmentDelay],
    metric: MapMetric,
    date: NaiveDate,
) -> String {
    let patterns: HashMap<&str, &Pattern> = graph
        .patterns()
        .map(|(_, pattern)| (pattern.id.as_str(), pattern))
        .collect();

    let mut features = vec![];
    let mut latitudes = vec![];
    let mut longitudes = vec![];
    for segment in segments {
        let Some(pattern) = patterns.get(segment.pattern_id.as_str()) else {
            log::warn!("segment references unknown pattern {}", segment.pattern_id);
            continue;
        };
        let Some(from) = pattern.stops.get(segment.index) else {
            continue;
        };
        let Some(to) = pattern.stops.get(segment.index + 1) else {
            continue;
        };

        let value = metric.value(segment);
        latitudes.extend([from.lat, to.lat]);
        longitudes.extend([from.lon, to.lon]);
        features.push(serde_json::json!({
            "from": [from.lat, from.lon],
            "to": [to.lat, to.lon],
            "color": metric.color(value),
            "tooltip": format!(
                "{} → {}: {:.1} min ({} samples)",
                from.name, to.name, value, segment.sample_count,
            ),
        }));
    }

    // default view: Hungary
    let center_lat = center(&latitudes, 47.1625);
    let center_lon = center(&longitudes, 19.5033);

    let legend_rows = metric
        .legend()
        .iter()
        .map(|(color, label)| {
            format!(
                "<div><span style=\"background:{}\"></span>{}</div>",
                color, label
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title} - {date}</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>
    html, body, #map {{ height: 100%; margin: 0; }}
    .legend {{
      position: absolute; bottom: 16px; left: 16px; z-index: 1000;
      background: rgba(255, 255, 255, 0.9); padding: 8px 12px;
      font: 13px sans-serif; border-radius: 4px;
    }}
    .legend span {{
      display: inline-block; width: 14px; height: 14px;
      margin-right: 6px; vertical-align: middle;
    }}
  </style>
</head>
<body>
  <div id="map"></div>
  <div class="legend">
    <b>{title}</b><br>{date}
        {legend_rows}
  </div>
  <script>
    var map = L.map('map').setView([{center_lat}, {center_lon}], 7);
    L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
      attribution: '&copy; OpenStreetMap contributors'
    }}).addTo(map);
    var segments = {segments_json};
    segments.forEach(function (segment) {{
      L.polyline([segment.from, segment.to], {{
        color: segment.color,
        weight: 4,
        opacity: 0.8
      }}).bindTooltip(segment.tooltip).addTo(map);
    }});
  </script>
</body>
</html>
"#,
        title = metric.title(),
        date = date.format("%Y-%m-%d"),
        legend_rows = legend_rows,
        center_lat = center_lat,
        center_lon = center_lon,
        segments_json = serde_json::Value::Array(features),
    )
}

fn center(values: &[f64], fallback: f64) -> f64 {
    if values.is_empty() {
        fallback
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{PatternStop, RailRoute};

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

    fn segment(max: i64, mean: f64) -> SegmentDelay {
        SegmentDelay {
            pattern_id: "P1".to_owned(),
            index: 0,
            from_station: "A".to_owned(),
            to_station: "B".to_owned(),
            max_delay_min: max,
            mean_delay_min: mean,
            weighted_mean_delay_min: mean,
            sample_count: 3,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    #[test]
    fn renders_segments_with_metric_colors() {
        let html = render_map(&graph(), &[segment(30, 3.0)], MapMetric::Mean, date());
        assert!(html.contains("Average train delays"));
        assert!(html.contains("#FFA500"));
        assert!(html.contains("Alpha → Beta"));

        let html = render_map(&graph(), &[segment(30, 3.0)], MapMetric::Max, date());
        assert!(html.contains("Maximum train delays"));
        assert!(html.contains("#FF6600"));
    }

    #[test]
    fn unknown_patterns_are_dropped_but_the_map_renders() {
        let mut foreign = segment(5, 1.0);
        foreign.pattern_id = "nope".to_owned();
        let html = render_map(&graph(), &[foreign], MapMetric::Mean, date());
        assert!(html.contains("var segments = []"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let segments = [segment(30, 3.0), segment(2, 0.5)];
        let first = render_map(&graph(), &segments, MapMetric::Max, date());
        let second = render_map(&graph(), &segments, MapMetric::Max, date());
        assert_eq!(first, second);
    }

    #[test]
    fn color_ramps_are_monotonic() {
        let colors = [0.0, 1.5, 4.0, 8.0, 30.0]
            .map(|minutes| MapMetric::Mean.color(minutes));
        assert_eq!(
            colors,
            ["#00FF00", "#FFFF00", "#FFA500", "#FF6600", "#FF0000"]
        );
    }
}
