//! Error types for the caching layer.

use thiserror::Error;

/// Failure of a single fetch against a data source.
///
/// Cancellation is not an error: a cancelled fetch is reported as
/// [`FetchOutcome::Ignored`](crate::binding::FetchOutcome::Ignored), never as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The upstream could not be reached or the transfer broke off.
    #[error("Network error: {0}")]
    Network(String),
    /// The upstream did not answer within the time budget.
    #[error("Request timed out")]
    Timeout,
    /// The upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status}")]
    HttpStatus { status: u16, body: String },
    /// The payload could not be interpreted.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<geofetch_api::Error> for FetchError {
    fn from(e: geofetch_api::Error) -> Self {
        match e {
            geofetch_api::Error::Timeout => Self::Timeout,
            geofetch_api::Error::HttpStatus { status, body } => Self::HttpStatus { status, body },
            geofetch_api::Error::Parse(msg) => Self::Malformed(msg),
            other => Self::Network(other.to_string()),
        }
    }
}

/// Errors from loading or validating [`Settings`](crate::settings::Settings).
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid settings: {0}")]
    Invalid(String),
}
