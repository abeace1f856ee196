//! Gemini File Search client — production [`AnswerProvider`] / [`DocumentLister`].
//!
//! Answers come from `models/{model}:generateContent` with a `fileSearch`
//! tool attached; citations are read out of the response's grounding
//! metadata. Document listings paginate `{store}/documents`; an HTTP 400 on
//! a store ends that store's pagination (the API answers 400 for stores that
//! are still indexing).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use quern_core::config::KbConfig;

use crate::client::{Answer, AnswerProvider, DocumentInfo, DocumentListing, DocumentLister};
use crate::error::KbError;

/// Fixed system instruction for KB answers. Kept short on purpose: the bot
/// lives in a chat sidebar, not a wiki.
const SYSTEM_INSTRUCTION: &str = "\
You are an internal knowledge-base assistant.
- Answer in the same language the user wrote in.
- Ground every answer in the attached document store.
- Be very concise by default: 5-8 lines maximum.
- For broad questions, summarize and offer to expand on specifics.
- If the store does not cover the question, say so and ask for context.";

const LIST_PAGE_SIZE: u32 = 50;

pub struct GeminiKbClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    store_names: Vec<String>,
}

impl GeminiKbClient {
    pub fn new(config: &KbConfig) -> Result<Self, KbError> {
        if config.api_key.trim().is_empty() {
            return Err(KbError::Config("kb.api_key is empty".into()));
        }
        if config.store_names.is_empty() {
            return Err(KbError::Config("kb.store_names is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            store_names: config.store_names.clone(),
        })
    }

    async fn fetch_store_documents(
        &self,
        store_name: &str,
        out: &mut Vec<DocumentInfo>,
    ) -> Result<(), KbError> {
        let url = format!("{}/{}/documents", self.api_base, store_name);
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(&url)
                .query(&[("key", self.api_key.as_str())])
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await?;
            let status = resp.status().as_u16();
            if status == 400 {
                // Store not listable yet (still indexing) — treat as empty.
                debug!(store = %store_name, "document listing returned 400, stopping");
                return Ok(());
            }
            if !resp.status().is_success() {
                let message = resp.text().await.unwrap_or_default();
                warn!(store = %store_name, status, "document listing failed");
                return Err(KbError::Api { status, message });
            }

            let page: ListDocumentsPage =
                resp.json().await.map_err(|e| KbError::Parse(e.to_string()))?;
            out.extend(page.documents.into_iter().map(DocumentInfo::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl AnswerProvider for GeminiKbClient {
    async fn answer(
        &self,
        question: &str,
        metadata_filter: Option<&str>,
    ) -> Result<Answer, KbError> {
        let mut file_search = json!({ "fileSearchStoreNames": self.store_names });
        if let Some(filter) = metadata_filter {
            file_search["metadataFilter"] = json!(filter);
        }

        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": question }] }],
            "tools": [{ "fileSearch": file_search }],
            "generationConfig": { "temperature": 0.2 },
        });

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        debug!(model = %self.model, filter = ?metadata_filter, "sending KB query");

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, "KB generateContent failed");
            return Err(KbError::Api { status, message });
        }

        let api_resp: GenerateContentResponse =
            resp.json().await.map_err(|e| KbError::Parse(e.to_string()))?;
        Ok(parse_answer(api_resp))
    }
}

#[async_trait]
impl DocumentLister for GeminiKbClient {
    async fn list_documents(&self) -> Result<DocumentListing, KbError> {
        let mut documents = Vec::new();
        for store_name in &self.store_names {
            self.fetch_store_documents(store_name, &mut documents).await?;
        }
        Ok(DocumentListing {
            count: documents.len(),
            documents,
        })
    }
}

// ---- wire types ----

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingChunk {
    #[serde(default)]
    retrieved_context: Option<RetrievedContext>,
}

#[derive(Debug, Deserialize)]
struct RetrievedContext {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsPage {
    #[serde(default)]
    documents: Vec<StoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    custom_metadata: Vec<CustomMetadataEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomMetadataEntry {
    key: String,
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    numeric_value: Option<f64>,
}

impl From<StoreDocument> for DocumentInfo {
    fn from(doc: StoreDocument) -> Self {
        let path = doc.display_name.unwrap_or_else(|| doc.name.clone());
        let metadata: HashMap<String, String> = doc
            .custom_metadata
            .into_iter()
            .filter_map(|entry| {
                let value = entry
                    .string_value
                    .or_else(|| entry.numeric_value.map(|n| n.to_string()))?;
                Some((entry.key, value))
            })
            .collect();
        DocumentInfo {
            id: doc.name,
            path,
            metadata,
        }
    }
}

fn parse_answer(resp: GenerateContentResponse) -> Answer {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Answer::default();
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    // Unique source labels, retrieval order preserved.
    let mut sources = Vec::new();
    if let Some(gm) = candidate.grounding_metadata {
        for chunk in gm.grounding_chunks {
            let Some(rc) = chunk.retrieved_context else {
                continue;
            };
            let label = rc
                .title
                .filter(|t| !t.trim().is_empty())
                .or(rc.uri)
                .unwrap_or_default()
                .trim()
                .to_string();
            if !label.is_empty() && !sources.contains(&label) {
                sources.push(label);
            }
        }
    }

    Answer { text, sources }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_answer_extracts_text_and_unique_sources() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Refunds take 5 days.  " }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "retrievedContext": { "title": "handbook/refunds.md" } },
                        { "retrievedContext": { "title": "handbook/refunds.md" } },
                        { "retrievedContext": { "title": "", "uri": "gs://kb/policy.md" } },
                        { }
                    ]
                }
            }]
        });
        let resp: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let answer = parse_answer(resp);
        assert_eq!(answer.text, "Refunds take 5 days.");
        assert_eq!(answer.sources, vec!["handbook/refunds.md", "gs://kb/policy.md"]);
    }

    #[test]
    fn parse_answer_tolerates_empty_response() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        let answer = parse_answer(resp);
        assert!(answer.text.is_empty());
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn store_document_maps_display_name_and_metadata() {
        let raw = serde_json::json!({
            "name": "fileSearchStores/kb/documents/d1",
            "displayName": "operations/support/checklists/checklist-refunds.md",
            "customMetadata": [
                { "key": "department", "stringValue": "operations" },
                { "key": "revision", "numericValue": 3.0 }
            ]
        });
        let doc: StoreDocument = serde_json::from_value(raw).unwrap();
        let info = DocumentInfo::from(doc);
        assert_eq!(info.id, "fileSearchStores/kb/documents/d1");
        assert_eq!(
            info.path,
            "operations/support/checklists/checklist-refunds.md"
        );
        assert_eq!(info.metadata["department"], "operations");
        assert_eq!(info.metadata["revision"], "3");
    }

    #[test]
    fn store_document_falls_back_to_resource_name() {
        let raw = serde_json::json!({ "name": "fileSearchStores/kb/documents/d2" });
        let doc: StoreDocument = serde_json::from_value(raw).unwrap();
        let info = DocumentInfo::from(doc);
        assert_eq!(info.path, "fileSearchStores/kb/documents/d2");
    }
}
