//! Minimal GET-only client for an arbitrary JSON data API.

use std::time::Duration;

use url::Url;

use crate::client::truncate_body;
use crate::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches JSON documents from endpoints under a common base URL.
///
/// Responses are returned as untyped [`serde_json::Value`]; shaping them is
/// the caller's business.
#[derive(Clone)]
pub struct JsonClient {
    http: reqwest::Client,
    base_url: String,
}

impl JsonClient {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GETs `endpoint` (a path such as `/stats/daily`) with the given query pairs.
    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, Error> {
        let path = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };
        let url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self.http.get(url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            tracing::warn!("{} returned {}", path, status);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))
    }
}
