use std::time::Duration;

use thiserror::Error;

/// A curl command or HAR document that could not be turned into requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(
        "URL contains unresolved environment variables: {}\nAvailable variables: [{}]",
        .missing.join(", "),
        .available.join(", ")
    )]
    UnresolvedVariables {
        missing: Vec<String>,
        available: Vec<String>,
    },
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Flattens a reqwest error and its source chain into one line.
    pub(crate) fn describe(error: &reqwest::Error) -> String {
        let mut message = error.to_string();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }
}
