//! HTTP client for a Nominatim-compatible reverse-geocoding service.

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    query::{Query, ReverseQuery},
    types::ReverseResponse,
    Error,
};

/// Public Nominatim instance. Its usage policy caps clients at one request
/// per second and requires an identifying user agent.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Outer bound on a single request. Callers usually impose a tighter one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the reverse-geocoding upstream.
///
/// Every request carries the configured client identifier as its
/// `User-Agent`. The client does no caching or pacing of its own.
pub struct Client {
    http: reqwest::Client,
    /// Base URL for the API, without a trailing slash.
    base_api_url: String,
}

impl Client {
    /// Creates a client for the service at `base_url`, usually
    /// [`DEFAULT_BASE_URL`]. Self-hosted instances and wiremock servers work too.
    pub fn with_base_url(base_url: &str, user_agent: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;
        Ok(Self {
            http,
            base_api_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_url(&self, path: &str, query: &impl Query) -> Result<Url, Error> {
        let url = Url::parse(format!("{}{}", &self.base_api_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::InvalidUrl(e.to_string())
        })?;
        Ok(query.add_to_url(&url))
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Query,
    {
        let url = self.get_url(path, query)?;
        let resp = self
            .http
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource: {}", e);
                Error::from(e)
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            Error::from(e)
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let snippet = truncate_body(&body);
            tracing::error!("Failed to parse resource: {} | body: {}", e, snippet);
            Error::Parse(e.to_string())
        })
    }

    /// Looks up the address closest to a coordinate.
    pub async fn reverse(&self, query: &ReverseQuery) -> Result<ReverseResponse, Error> {
        self.get::<ReverseResponse, ReverseQuery>("/reverse", query)
            .await
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
