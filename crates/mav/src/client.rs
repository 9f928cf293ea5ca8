use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;

use crate::offer::OfferResponse;
use crate::payload::OfferRequest;
use crate::ApiError;

pub const OFFER_API_URL: &str =
    "https://jegy-a.mav.hu/IK_API_PROD/api/OfferRequestApi/GetOfferRequest";

/// Browser identities the client rotates through.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared client for the offer API. Keeps one connection pool and cookie jar
/// for the whole run; safe to use from several workers at once.
pub struct MavApiClient {
    client: reqwest::Client,
    user_agent: RwLock<&'static str>,
}

impl MavApiClient {
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            user_agent: RwLock::new(USER_AGENTS[0]),
        })
    }

    /// Picks a fresh browser identity. Workers call this with a small
    /// probability per attempt; all other headers stay fixed.
    pub async fn rotate_user_agent(&self) {
        let pick = rand::thread_rng().gen_range(0..USER_AGENTS.len());
        *self.user_agent.write().await = USER_AGENTS[pick];
    }

    async fn send_once(&self, payload: &OfferRequest) -> Result<OfferResponse, ApiError> {
        let body =
            serde_json::to_vec(payload).map_err(|why| ApiError::Payload(why.to_string()))?;
        let user_agent = *self.user_agent.read().await;

        let response = self
            .client
            .post(OFFER_API_URL)
            .header("User-Agent", user_agent)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9,hu;q=0.8")
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Origin", "https://jegy.mav.hu")
            .header("Referer", "https://jegy.mav.hu/")
            .header("DNT", "1")
            .header("UserSessionId", "''")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.ok();
            return Err(ApiError::InvalidResponse {
                status_code: status,
                url: OFFER_API_URL.to_owned(),
                response: text.as_deref().map(excerpt),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|why| ApiError::Payload(format!("{} in: {}", why, excerpt(&text))))
    }

    /// Fetches the itineraries for one offer request. This is a single call;
    /// the harvest worker owns the retry policy. Returns the raw `route`
    /// elements; a 2xx body without a `route` field is a payload error.
    pub async fn fetch_offers(
        &self,
        payload: &OfferRequest,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let response = self.send_once(payload).await?;
        response
            .route
            .ok_or_else(|| ApiError::Payload("response has no 'route' field".to_owned()))
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_server_errors_are_retryable() {
        let server = ApiError::InvalidResponse {
            status_code: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            url: OFFER_API_URL.to_owned(),
            response: None,
        };
        assert!(server.is_retryable());

        let client = ApiError::InvalidResponse {
            status_code: reqwest::StatusCode::FORBIDDEN,
            url: OFFER_API_URL.to_owned(),
            response: Some("blocked".to_owned()),
        };
        assert!(!client.is_retryable());

        let payload = ApiError::Payload("no route".to_owned());
        assert!(!payload.is_retryable());
    }

    #[test]
    fn excerpt_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(excerpt(&long).len(), 200);
    }
}
