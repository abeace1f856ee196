use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<SheetsError> for quern_core::QuernError {
    fn from(e: SheetsError) -> Self {
        quern_core::QuernError::FeedbackSink(e.to_string())
    }
}
