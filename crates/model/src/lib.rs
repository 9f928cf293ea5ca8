pub mod observation;
pub mod pair;
pub mod route_graph;
pub mod run;
pub mod summary;

pub use observation::{Itinerary, Leg, Observation, ObservationStats, RouteInfo};
pub use pair::StationPair;
pub use route_graph::{Pattern, PatternStop, RailRoute, RouteGraph};
pub use run::{RunPhase, RunReport, RunStats, RunStatus, UploadStats};
pub use summary::{PairDaySummary, SegmentDelay};
