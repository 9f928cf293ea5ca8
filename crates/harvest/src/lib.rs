use std::error;
use std::fmt;
use std::sync::Arc;

use storage::StoreError;

pub mod calllog;
pub mod orchestrator;
pub mod pairs;
pub mod politeness;
pub mod publisher;
pub mod worker;

pub use orchestrator::{DailyRunOptions, Orchestrator};
pub use worker::{HarvestOptions, HarvestPool, OfferSource, ProgressHook};

#[derive(Debug, Clone)]
pub enum HarvestError {
    /// a run is already active; starting another one has no effect.
    Conflict,
    /// the pair list could not be read.
    Pairs(String),
    Io(Arc<std::io::Error>),
    Json(Arc<serde_json::Error>),
    Store(StoreError),
    /// the harvest driver paniced; the panic payload is preserved.
    Panicked(String),
}

impl error::Error for HarvestError {}

impl fmt::Display for HarvestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HarvestError::Conflict => write!(f, "a run is already active"),
            HarvestError::Pairs(why) => write!(f, "could not load pair list: {}", why),
            HarvestError::Io(why) => write!(f, "io error: {}", why),
            HarvestError::Json(why) => write!(f, "serialization error: {}", why),
            HarvestError::Store(why) => write!(f, "store error: {}", why),
            HarvestError::Panicked(why) => write!(f, "harvest driver paniced: {}", why),
        }
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(why: std::io::Error) -> Self {
        HarvestError::Io(Arc::new(why))
    }
}

impl From<StoreError> for HarvestError {
    fn from(why: StoreError) -> Self {
        HarvestError::Store(why)
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(why: serde_json::Error) -> Self {
        HarvestError::Json(Arc::new(why))
    }
}

impl From<csv::Error> for HarvestError {
    fn from(why: csv::Error) -> Self {
        HarvestError::Pairs(why.to_string())
    }
}
