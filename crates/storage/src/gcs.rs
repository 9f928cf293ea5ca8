use std::env;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::StoreError;
use async_trait::async_trait;

pub const STORAGE_API_URL: &str = "https://storage.googleapis.com/storage/v1";
pub const UPLOAD_API_URL: &str = "https://storage.googleapis.com/upload/storage/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// transient failures are retried this many times with a fixed backoff.
const TRANSIENT_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct GcsConfig {
    pub bucket: String,
    pub project_id: Option<String>,
    /// pre-issued OAuth token; when absent the GCE metadata server is asked.
    pub access_token: Option<String>,
}

impl GcsConfig {
    pub fn env() -> Result<Self, StoreError> {
        let bucket = env::var("BUCKET_NAME")
            .map_err(|_| StoreError::Permanent("BUCKET_NAME not set".to_owned()))?;
        Ok(Self {
            bucket,
            project_id: env::var("PROJECT_ID").ok(),
            access_token: env::var("GCS_ACCESS_TOKEN").ok(),
        })
    }
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Local>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListedObject>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
}

/// Object store backed by the Google Cloud Storage JSON API.
pub struct GcsStore {
    config: GcsConfig,
    client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl GcsStore {
    pub fn new(config: GcsConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|why| StoreError::Permanent(why.to_string()))?;
        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn bearer_token(&self) -> Result<String, StoreError> {
        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }

        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Local::now() {
                return Ok(cached.value.clone());
            }
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Permanent(format!(
                "metadata server refused token request ({})",
                response.status()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|why| StoreError::Transient(why.to_string()))?;

        let cached = CachedToken {
            value: token.access_token.clone(),
            // refresh a minute early so in-flight requests never carry an
            // expired token.
            expires_at: Local::now() + chrono::Duration::seconds(token.expires_in - 60),
        };
        *self.token.write().await = Some(cached);
        Ok(token.access_token)
    }

    fn classify(status: reqwest::StatusCode, key: &str) -> StoreError {
        match status.as_u16() {
            401 | 403 => StoreError::Permanent(format!("{} for {}", status, key)),
            404 => StoreError::NotFound(key.to_owned()),
            408 | 429 => StoreError::Transient(format!("{} for {}", status, key)),
            500..=599 => StoreError::Transient(format!("{} for {}", status, key)),
            _ => StoreError::Permanent(format!("{} for {}", status, key)),
        }
    }

    async fn put_once(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError> {
        let token = self.bearer_token().await?;
        let url = format!(
            "{}/b/{}/o?uploadType=media&name={}",
            UPLOAD_API_URL,
            self.config.bucket,
            urlencoding::encode(key),
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(bytes.to_vec())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify(response.status(), key))
        }
    }

    async fn get_once(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let token = self.bearer_token().await?;
        let url = format!(
            "{}/b/{}/o/{}?alt=media",
            STORAGE_API_URL,
            self.config.bucket,
            urlencoding::encode(key),
        );
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(Self::classify(response.status(), key))
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListResponse, StoreError> {
        let token = self.bearer_token().await?;
        let mut url = format!(
            "{}/b/{}/o?prefix={}&fields=items/name,nextPageToken",
            STORAGE_API_URL,
            self.config.bucket,
            urlencoding::encode(prefix),
        );
        if let Some(page_token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(page_token));
        }
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(Self::classify(response.status(), prefix));
        }
        response
            .json()
            .await
            .map_err(|why| StoreError::Transient(why.to_string()))
    }
}

/// Runs `operation` and retries transient failures a bounded number of times.
async fn with_retries<T, F, Fut>(mut operation: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(why) if why.is_transient() && attempt < TRANSIENT_RETRIES => {
                attempt += 1;
                log::warn!("store call failed ({}), retry {}/{}", why, attempt, TRANSIENT_RETRIES);
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(why) => return Err(why),
        }
    }
}

#[async_trait]
impl crate::ObjectStore for GcsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        with_retries(|| self.put_once(key, &bytes, content_type)).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        with_retries(|| self.get_once(key)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = vec![];
        let mut page_token: Option<String> = None;
        loop {
            let page = with_retries(|| self.list_page(prefix, page_token.as_deref())).await?;
            keys.extend(page.items.into_iter().map(|object| object.name));
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(keys)
    }
}
