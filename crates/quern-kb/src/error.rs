use thiserror::Error;

/// Errors from the knowledge-base collaborators.
///
/// The orchestrator renders these inline for the user instead of propagating
/// them, so the display strings are written to be shown as-is.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KbError {
    /// Short kind label for inline `Error: <kind>: <message>` rendering.
    pub fn kind(&self) -> &'static str {
        match self {
            KbError::Http(_) => "http",
            KbError::Api { .. } => "api",
            KbError::Parse(_) => "parse",
            KbError::Config(_) => "config",
        }
    }
}
