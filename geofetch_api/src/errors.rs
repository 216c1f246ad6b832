//! Error types for the API clients.

/// Errors that can occur when making API requests.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (connection refused, DNS, TLS, body read).
    #[error("Request failed")]
    RequestFailed,
    /// The request exceeded the client's time budget.
    #[error("Request timed out")]
    Timeout,
    /// The API returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The base URL and path did not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The response body was not the JSON shape we expected.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::RequestFailed
        }
    }
}
