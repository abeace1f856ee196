use thiserror::Error;

/// Errors from the Slack adapter.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack answered `ok: false`.
    #[error("Slack API error ({method}): {message}")]
    Api { method: String, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<SlackError> for quern_core::QuernError {
    fn from(e: SlackError) -> Self {
        quern_core::QuernError::Transport(e.to_string())
    }
}
