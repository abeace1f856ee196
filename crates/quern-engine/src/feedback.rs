//! Answer-context correlation and the feedback sink seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quern_core::error::QuernError;

/// The exchange behind one outbound answer, kept so a later feedback
/// submission can be attributed to it.
#[derive(Debug, Clone)]
pub struct AnswerContext {
    pub prompt: String,
    pub response: String,
    /// Generated id for this exchange, used in logs and audit trails.
    pub answer_id: String,
}

/// `outbound message id → AnswerContext`. Written once per feedback-offering
/// post, read-only afterwards. Entries are never evicted: this is a
/// process-local cache, not a store of record.
#[derive(Default)]
pub struct ContextStore {
    entries: HashMap<String, AnswerContext>,
}

impl ContextStore {
    /// Record the exchange behind `message_id`. Returns the generated
    /// answer id.
    pub fn record(&mut self, message_id: &str, prompt: String, response: String) -> String {
        let answer_id = Uuid::new_v4().to_string();
        self.entries.insert(
            message_id.to_string(),
            AnswerContext {
                prompt,
                response,
                answer_id: answer_id.clone(),
            },
        );
        answer_id
    }

    pub fn lookup(&self, message_id: &str) -> Option<&AnswerContext> {
        self.entries.get(message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed feedback submission as delivered by the transport adapter.
#[derive(Debug, Clone)]
pub struct FeedbackSubmission {
    /// Outbound message id the feedback refers to. May be unknown to the
    /// context store (e.g. the process restarted since the answer was
    /// posted) — the row is then written with blank prompt/response.
    pub message_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub rating: String,
    pub comment: String,
}

/// One appended feedback row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRow {
    /// RFC 3339 submission timestamp.
    pub submitted_at: String,
    pub user_id: String,
    pub rating: String,
    pub comment: String,
    pub prompt: String,
    pub response: String,
}

impl FeedbackRow {
    /// Column values in sheet order.
    pub fn values(&self) -> [&str; 6] {
        [
            &self.submitted_at,
            &self.user_id,
            &self.rating,
            &self.comment,
            &self.prompt,
            &self.response,
        ]
    }
}

/// Destination for feedback rows (production: a spreadsheet append).
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn append_row(&self, row: &FeedbackRow) -> Result<(), QuernError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_lookup_round_trips() {
        let mut store = ContextStore::default();
        let answer_id = store.record("1727.0001", "prompt".into(), "response".into());
        let ctx = store.lookup("1727.0001").unwrap();
        assert_eq!(ctx.prompt, "prompt");
        assert_eq!(ctx.response, "response");
        assert_eq!(ctx.answer_id, answer_id);
    }

    #[test]
    fn unknown_message_id_is_absent() {
        let store = ContextStore::default();
        assert!(store.lookup("nope").is_none());
    }

    #[test]
    fn answer_ids_are_unique_per_record() {
        let mut store = ContextStore::default();
        let a = store.record("m1", String::new(), String::new());
        let b = store.record("m2", String::new(), String::new());
        assert_ne!(a, b);
    }
}
