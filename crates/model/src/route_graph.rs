use serde::{Deserialize, Serialize};

/// Static route geometry, supplied by an external fetcher and read here
/// as-is. Only the joiner consumes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteGraph {
    pub routes: Vec<RailRoute>,
}

impl RouteGraph {
    pub fn patterns(&self) -> impl Iterator<Item = (&RailRoute, &Pattern)> {
        self.routes
            .iter()
            .flat_map(|route| route.patterns.iter().map(move |pattern| (route, pattern)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailRoute {
    pub id: String,
    pub desc: String,
    pub agency_name: String,
    pub long_name: String,
    pub short_name: String,
    pub mode: String,
    pub route_type: i32,
    pub color: String,
    pub text_color: String,
    pub patterns: Vec<Pattern>,
}

/// One traversal order of a route: an ordered list of stations with
/// coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub headsign: String,
    pub name: String,
    pub stops: Vec<PatternStop>,
}

impl Pattern {
    /// Index of the earliest occurrence of `origin` followed by the earliest
    /// later occurrence of `destination`, in pattern-native order only.
    pub fn span(&self, origin: &str, destination: &str) -> Option<(usize, usize)> {
        let start = self.stops.iter().position(|stop| stop.pure_id == origin)?;
        let end = self.stops[start + 1..]
            .iter()
            .position(|stop| stop.pure_id == destination)?
            + start
            + 1;
        Some((start, end))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStop {
    pub raw_id: String,
    /// station identifier with the feed prefix and platform suffix removed,
    /// comparable against offer-API station codes.
    pub pure_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str) -> PatternStop {
        PatternStop {
            raw_id: format!("1:{id}_0"),
            pure_id: id.to_owned(),
            name: id.to_owned(),
            lat: 47.0,
            lon: 19.0,
        }
    }

    fn pattern(ids: &[&str]) -> Pattern {
        Pattern {
            id: "1:0001:01".to_owned(),
            headsign: "Szeged".to_owned(),
            name: "test".to_owned(),
            stops: ids.iter().map(|id| stop(id)).collect(),
        }
    }

    #[test]
    fn span_matches_native_order_only() {
        let pattern = pattern(&["A", "X", "B"]);
        assert_eq!(pattern.span("A", "B"), Some((0, 2)));
        assert_eq!(pattern.span("B", "A"), None);
        assert_eq!(pattern.span("A", "Y"), None);
    }

    #[test]
    fn span_takes_earliest_origin_then_earliest_later_destination() {
        let pattern = pattern(&["A", "B", "A", "B"]);
        assert_eq!(pattern.span("A", "B"), Some((0, 1)));
    }

    #[test]
    fn span_of_adjacent_stations() {
        let pattern = pattern(&["A", "B"]);
        assert_eq!(pattern.span("A", "B"), Some((0, 1)));
    }
}
