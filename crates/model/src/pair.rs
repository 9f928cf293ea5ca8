use serde::{Deserialize, Serialize};

/// An ordered origin/destination pair of opaque station identifiers.
/// This is the unit of work for a harvest run: one offer request per pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationPair {
    pub origin: String,
    pub destination: String,
}

impl StationPair {
    pub fn new<O: Into<String>, D: Into<String>>(origin: O, destination: D) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

impl std::fmt::Display for StationPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}
