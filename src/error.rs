//! Error types shared by the dashboard library.

use thiserror::Error;

/// Errors surfaced by the API client, the config model and the viewer port.
///
/// None of these are fatal to the dashboard: callers turn them into a
/// status-line message and keep the last good view.
#[derive(Debug, Error)]
pub enum DashError {
    /// Transport failure or a body that could not be decoded as JSON.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with `ok: false`.
    #[error("{0}")]
    Api(String),
    /// The server refused to hand out a stored configuration.
    #[error("load config failed: {0}")]
    ConfigLoad(String),
    /// Operator input rejected before any request was issued.
    #[error("{0}")]
    Validation(String),
    /// The host environment refused to create a surface.
    #[error("{0}")]
    Environment(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DashError>;

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> Self {
        DashError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::Network(format!("invalid response: {err}"))
    }
}

impl From<url::ParseError> for DashError {
    fn from(err: url::ParseError) -> Self {
        DashError::Network(format!("invalid url: {err}"))
    }
}
