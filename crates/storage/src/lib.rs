use std::error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub mod gcs;
pub mod keys;
pub mod memory;

pub use gcs::GcsStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone)]
pub enum StoreError {
    /// network-level or service-side failure that is worth retrying.
    Transient(String),
    /// authentication or authorization failure; retrying will not help.
    Permanent(String),
    NotFound(String),
}

impl error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Transient(why) => write!(f, "transient store error: {}", why),
            StoreError::Permanent(why) => write!(f, "permanent store error: {}", why),
            StoreError::NotFound(key) => write!(f, "object not found: {}", key),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(why: reqwest::Error) -> Self {
        StoreError::Transient(why.to_string())
    }
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// A thin, typed facade over a blob store with hierarchical string keys.
/// `put` replaces any prior value at the key, so retries that write the same
/// bytes are harmless; callers rely on that for at-least-once uploads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Lists all keys under the prefix. Pagination, if any, is handled
    /// internally; the full listing is returned.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

pub type SharedStore = Arc<dyn ObjectStore>;
