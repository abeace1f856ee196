use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuernError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Feedback sink error: {0}")]
    FeedbackSink(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuernError {
    /// Short error kind label used when a failure is rendered inline for the user.
    pub fn kind(&self) -> &'static str {
        match self {
            QuernError::Config(_) => "config",
            QuernError::Transport(_) => "transport",
            QuernError::KnowledgeBase(_) => "knowledge-base",
            QuernError::FeedbackSink(_) => "feedback-sink",
            QuernError::Serialization(_) => "serialization",
            QuernError::Io(_) => "io",
            QuernError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuernError>;
