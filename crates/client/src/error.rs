use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Server returned {status}: {body}")]
    Server { status: StatusCode, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network(e) => e.is_timeout() || e.is_connect(),
            ClientError::Server { status, .. } => status.is_server_error(),
            ClientError::Decode(_) | ClientError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e)
        }
    }
}
