use std::error;
use std::fmt;
use std::sync::Arc;

pub mod client;
pub mod offer;
pub mod parse;
pub mod payload;
pub mod time;

pub use client::MavApiClient;
pub use payload::OfferRequest;

#[derive(Debug, Clone)]
pub enum ApiError {
    /// network failure or request timeout.
    Request(Arc<reqwest::Error>),
    /// upstream answered with a non-2xx status.
    InvalidResponse {
        status_code: reqwest::StatusCode,
        url: String,
        response: Option<String>,
    },
    /// upstream answered 2xx but the body is not a usable offer response.
    Payload(String),
}

impl error::Error for ApiError {}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::Request(why) => write!(f, "HTTP request error: {}", why),
            ApiError::InvalidResponse {
                status_code,
                url,
                response,
            } => match response {
                Some(text) => {
                    write!(f, "Invalid Response ({}) {}: {}", status_code, url, text)
                }
                None => write!(f, "Invalid Response ({}) {}", status_code, url),
            },
            ApiError::Payload(why) => write!(f, "payload error: {}", why),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(why: reqwest::Error) -> Self {
        ApiError::Request(Arc::new(why))
    }
}

impl ApiError {
    /// Transport errors and server-side failures are worth another try;
    /// client errors and undecodable payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::InvalidResponse { status_code, .. } => status_code.is_server_error(),
            ApiError::Payload(_) => false,
        }
    }

    /// Short classification used in call-log records.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Request(_) => "transport",
            ApiError::InvalidResponse { .. } => "upstream_rejection",
            ApiError::Payload(_) => "payload",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::InvalidResponse { status_code, .. } => Some(status_code.as_u16()),
            _ => None,
        }
    }
}
