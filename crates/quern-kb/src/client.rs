use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KbError;

/// A generated answer with its grounding citations.
#[derive(Debug, Clone, Default)]
pub struct Answer {
    /// Response body. May be empty when the model produced nothing useful;
    /// the orchestrator substitutes a fixed notice in that case.
    pub text: String,
    /// Source labels, deduplicated and in retrieval order.
    pub sources: Vec<String>,
}

/// One document known to the knowledge-base store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Store-assigned resource id.
    pub id: String,
    /// Display path, e.g. `growth/campaigns/launch-checklist.md`. The first
    /// path segment is the document's section.
    pub path: String,
    /// Custom metadata attached at upload time.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Inventory snapshot returned by [`DocumentLister::list_documents`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentListing {
    pub count: usize,
    pub documents: Vec<DocumentInfo>,
}

/// Question → (answer, sources) collaborator.
///
/// Implementations must be `Send + Sync`; the engine calls this from flush
/// tasks running outside its state lock.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn answer(
        &self,
        question: &str,
        metadata_filter: Option<&str>,
    ) -> Result<Answer, KbError>;
}

/// Document inventory collaborator, used for stats replies and for building
/// the section index at startup.
#[async_trait]
pub trait DocumentLister: Send + Sync {
    async fn list_documents(&self) -> Result<DocumentListing, KbError>;
}
