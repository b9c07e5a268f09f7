//! REST backend integration for the walk tracker.
//!
//! Submits finished walks as the backend's `walking` payload:
//! `POST {base_url}/walking/insert/{user_id}` with a JSON body of
//! [`WalkingPayload`].

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use walk_core::{SessionRecord, SessionStore, UserId, WalkingPayload};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The provided base URL was unusable.
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
}

/// Walk backend client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty, unparseable or not an
    /// http(s) URL, or if the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let raw = base_url.into();
        let invalid = |reason| ApiError::InvalidBaseUrl {
            url: raw.clone(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("base URL cannot be empty"));
        }
        let base_url = Url::parse(raw.trim()).map_err(|_| invalid("not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base"));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(ApiError::ClientBuild)?;

        Ok(Self { http, base_url })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The insert endpoint for `user_id`.
    pub fn insert_url(&self, user_id: &UserId) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["walking", "insert", user_id.as_str()]);
        }
        url
    }

    /// Posts one walk to the backend.
    pub async fn submit_walk(
        &self,
        user_id: &UserId,
        payload: &WalkingPayload,
    ) -> Result<(), ApiError> {
        let url = self.insert_url(user_id);
        tracing::debug!(%url, "submitting walk");

        let response = self.http.post(url).json(payload).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Err(parse_api_error(&body).unwrap_or_else(|| ApiError::Api {
            message: format!("status {status}: {body}"),
        }))
    }
}

impl SessionStore for Client {
    type Error = ApiError;

    async fn save(&self, record: &SessionRecord) -> Result<(), ApiError> {
        self.submit_walk(&record.user_id, &record.to_payload()).await
    }
}

/// Extracts the message from an `{"error": ...}` body. The backend sends
/// either a bare string or an object with a `message`.
fn parse_api_error(body: &str) -> Option<ApiError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetails {
        Message(String),
        Object { message: String },
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| match payload.error {
            ErrorDetails::Message(message) | ErrorDetails::Object { message } => {
                ApiError::Api { message }
            }
        })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn user() -> UserId {
        UserId::new("walker-7").unwrap()
    }

    #[test]
    fn test_client_rejects_empty_base_url() {
        assert!(matches!(
            Client::new(""),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            Client::new("   "),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_client_rejects_non_http_urls() {
        for url in ["localhost:3000", "ftp://example.com", "mailto:me@example.com", "not a url"] {
            assert!(
                matches!(Client::new(url), Err(ApiError::InvalidBaseUrl { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_client_accepts_http_url() {
        assert!(Client::new("http://localhost:3000/api").is_ok());
    }

    #[test]
    fn test_insert_url_appends_walking_path() {
        let client = Client::new("http://localhost:3000/api").unwrap();
        assert_eq!(
            client.insert_url(&user()).as_str(),
            "http://localhost:3000/api/walking/insert/walker-7"
        );
    }

    #[test]
    fn test_insert_url_ignores_trailing_slash() {
        let client = Client::new("https://walks.example.com/api/").unwrap();
        assert_eq!(
            client.insert_url(&user()).as_str(),
            "https://walks.example.com/api/walking/insert/walker-7"
        );
    }

    #[test]
    fn test_insert_url_escapes_user_id() {
        let client = Client::new("http://localhost:3000").unwrap();
        let user = UserId::new("a b/c").unwrap();
        assert_eq!(
            client.insert_url(&user).as_str(),
            "http://localhost:3000/walking/insert/a%20b%2Fc"
        );
    }

    #[test]
    fn test_client_debug_shows_base_url() {
        let client = Client::new("http://localhost:3000").unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("http://localhost:3000/"));
    }

    #[test]
    fn test_parse_api_error_accepts_string_and_object() {
        let err = parse_api_error(r#"{"error":"user not found"}"#).unwrap();
        assert_eq!(err.to_string(), "API error: user not found");

        let err = parse_api_error(r#"{"error":{"message":"bad payload"}}"#).unwrap();
        assert_eq!(err.to_string(), "API error: bad payload");
    }

    #[test]
    fn test_parse_api_error_ignores_other_bodies() {
        assert!(parse_api_error("Internal Server Error").is_none());
        assert!(parse_api_error(r#"{"message":"ok"}"#).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_request_error() {
        // Port 9 (discard) on loopback is not expected to accept connections.
        let client = Client::new("http://127.0.0.1:9").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let payload = WalkingPayload {
            walking_start: start.naive_utc(),
            walking_end: start.naive_utc(),
            walking_distance: 0.0,
            walking_calorie: 0,
            walking_speed: 0.0,
        };

        let err = client.submit_walk(&user(), &payload).await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)), "{err}");
    }
}
