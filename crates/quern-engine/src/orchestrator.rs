//! Multi-section answer assembly.
//!
//! Turns a coalesced message into a single rendered reply: either a
//! stats/audit summary of the document store, or one answer block per
//! classified section query. Collaborator failures never escape — each
//! degrades to visible inline text so a broken section cannot take down the
//! rest of the reply.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use quern_classify::{classify, SectionIndex};
use quern_core::config::ClassifyConfig;
use quern_kb::{AnswerProvider, DocumentLister, KbError};

/// Shown when the store has nothing useful for a query.
const NO_ANSWER_NOTICE: &str =
    "I don't have enough information in the knowledge base to answer that.";

/// One rendering-ready answer for a section query.
#[derive(Debug, Clone)]
pub struct AnswerBlock {
    pub label: Option<String>,
    pub body: String,
    pub sources: Vec<String>,
}

/// The assembled outbound reply.
#[derive(Debug, Clone)]
pub struct RenderedReply {
    pub text: String,
    /// Whether the adapter should attach the feedback affordance. Stats and
    /// audit summaries don't take feedback.
    pub offer_feedback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Stats,
    Audit,
}

/// Cap on paths listed by an audit reply before eliding the rest.
const AUDIT_PATH_CAP: usize = 50;

pub struct AnswerOrchestrator {
    provider: Arc<dyn AnswerProvider>,
    lister: Arc<dyn DocumentLister>,
    index: Arc<SectionIndex>,
    classify_config: ClassifyConfig,
    stats_cache_ttl: Duration,
    // (command, rendered-at, text); one slot per command is plenty.
    stats_cache: Mutex<Vec<(Command, Instant, String)>>,
}

impl AnswerOrchestrator {
    pub fn new(
        provider: Arc<dyn AnswerProvider>,
        lister: Arc<dyn DocumentLister>,
        index: Arc<SectionIndex>,
        classify_config: ClassifyConfig,
        stats_cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            lister,
            index,
            classify_config,
            stats_cache_ttl,
            stats_cache: Mutex::new(Vec::new()),
        }
    }

    /// Build the reply for a coalesced message. Infallible by contract:
    /// collaborator errors are rendered inline, never returned.
    pub async fn build_response(&self, raw_text: &str) -> RenderedReply {
        if let Some(command) = parse_command(raw_text) {
            return RenderedReply {
                text: self.render_inventory(command).await,
                offer_feedback: false,
            };
        }

        let queries = classify(raw_text, &self.index, &self.classify_config);
        if queries.is_empty() {
            return RenderedReply {
                text: NO_ANSWER_NOTICE.to_string(),
                offer_feedback: false,
            };
        }

        let mut rendered = Vec::with_capacity(queries.len());
        for query in &queries {
            let block = match self
                .provider
                .answer(&query.query, query.filter.as_deref())
                .await
            {
                Ok(answer) => AnswerBlock {
                    label: query.section.clone(),
                    body: if answer.text.is_empty() {
                        NO_ANSWER_NOTICE.to_string()
                    } else {
                        answer.text
                    },
                    sources: answer.sources,
                },
                Err(e) => {
                    warn!(section = ?query.section, error = %e, "answer call failed");
                    AnswerBlock {
                        label: query.section.clone(),
                        body: inline_error(&e),
                        sources: Vec::new(),
                    }
                }
            };
            rendered.push(render_block(&block));
        }

        RenderedReply {
            text: rendered.join("\n\n"),
            offer_feedback: true,
        }
    }

    /// Stats/audit summary from the document lister, cached briefly so a
    /// chatty channel doesn't hammer the listing API. Errors are rendered
    /// inline and never cached.
    async fn render_inventory(&self, command: Command) -> String {
        let now = Instant::now();
        {
            let cache = self.stats_cache.lock().unwrap();
            if let Some((_, rendered_at, text)) = cache.iter().find(|(c, _, _)| *c == command) {
                if now.duration_since(*rendered_at) < self.stats_cache_ttl {
                    debug!(?command, "serving inventory from cache");
                    return text.clone();
                }
            }
        }

        let listing = match self.lister.list_documents().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "document listing failed");
                return inline_error(&e);
            }
        };

        let mut out = format!("📊 Knowledge base: {} documents", listing.count);
        let mut per_section: std::collections::BTreeMap<String, usize> =
            std::collections::BTreeMap::new();
        for doc in &listing.documents {
            let section = doc
                .path
                .split('/')
                .next()
                .unwrap_or("(unsectioned)")
                .to_lowercase();
            *per_section.entry(section).or_default() += 1;
        }
        for (section, count) in &per_section {
            out.push_str(&format!("\n• {section}: {count}"));
        }

        if command == Command::Audit {
            out.push_str("\n\nDocuments:");
            for doc in listing.documents.iter().take(AUDIT_PATH_CAP) {
                out.push_str(&format!("\n• {}", doc.path));
            }
            if listing.documents.len() > AUDIT_PATH_CAP {
                out.push_str(&format!(
                    "\n… and {} more",
                    listing.documents.len() - AUDIT_PATH_CAP
                ));
            }
        }

        let mut cache = self.stats_cache.lock().unwrap();
        cache.retain(|(c, _, _)| *c != command);
        cache.push((command, now, out.clone()));
        out
    }
}

/// Match the fixed command vocabulary, tolerating `/stats`, `!audit`,
/// stray whitespace and any casing.
fn parse_command(text: &str) -> Option<Command> {
    let word = text.trim().trim_start_matches(['/', '!']).trim();
    if word.eq_ignore_ascii_case("stats") {
        Some(Command::Stats)
    } else if word.eq_ignore_ascii_case("audit") {
        Some(Command::Audit)
    } else {
        None
    }
}

fn inline_error(e: &KbError) -> String {
    format!("⚠️ Error: {}: {}", e.kind(), e)
}

fn render_block(block: &AnswerBlock) -> String {
    let mut out = String::new();
    if let Some(label) = &block.label {
        out.push_str(&format!("📂 *{}*\n", capitalize(label)));
    }
    out.push_str(&block.body);

    // Skip the sources footer when the model already wrote one.
    let has_sources_heading = block.body.to_lowercase().contains("sources:");
    if !block.sources.is_empty() && !has_sources_heading {
        out.push_str("\n\nSources:");
        let mut listed: Vec<&str> = Vec::new();
        for source in &block.sources {
            if listed.contains(&source.as_str()) {
                continue;
            }
            listed.push(source);
            out.push_str(&format!("\n• {source}"));
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quern_kb::{Answer, DocumentInfo, DocumentListing};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        /// Filters containing this marker fail with an API error.
        fail_marker: Option<String>,
    }

    #[async_trait]
    impl AnswerProvider for StubProvider {
        async fn answer(
            &self,
            question: &str,
            metadata_filter: Option<&str>,
        ) -> Result<Answer, KbError> {
            if let (Some(marker), Some(filter)) = (&self.fail_marker, metadata_filter) {
                if filter.contains(marker.as_str()) {
                    return Err(KbError::Api {
                        status: 500,
                        message: "backend exploded".into(),
                    });
                }
            }
            Ok(Answer {
                text: format!("answer to: {question}"),
                sources: vec!["kb/doc.md".into(), "kb/doc.md".into(), "kb/other.md".into()],
            })
        }
    }

    struct StubLister {
        calls: AtomicUsize,
        paths: Vec<&'static str>,
    }

    #[async_trait]
    impl DocumentLister for StubLister {
        async fn list_documents(&self) -> Result<DocumentListing, KbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let documents: Vec<DocumentInfo> = self
                .paths
                .iter()
                .map(|p| DocumentInfo {
                    id: format!("doc-{p}"),
                    path: p.to_string(),
                    metadata: Default::default(),
                })
                .collect();
            Ok(DocumentListing {
                count: documents.len(),
                documents,
            })
        }
    }

    fn orchestrator(
        fail_marker: Option<&str>,
        paths: Vec<&'static str>,
    ) -> (AnswerOrchestrator, Arc<StubLister>) {
        let lister = Arc::new(StubLister {
            calls: AtomicUsize::new(0),
            paths: paths.clone(),
        });
        let documents: Vec<DocumentInfo> = paths
            .iter()
            .map(|p| DocumentInfo {
                id: format!("doc-{p}"),
                path: p.to_string(),
                metadata: Default::default(),
            })
            .collect();
        let listing = DocumentListing {
            count: documents.len(),
            documents,
        };
        let index = Arc::new(SectionIndex::build(&listing, &ClassifyConfig::default()));
        let orch = AnswerOrchestrator::new(
            Arc::new(StubProvider {
                fail_marker: fail_marker.map(String::from),
            }),
            Arc::clone(&lister) as Arc<dyn DocumentLister>,
            index,
            ClassifyConfig::default(),
            Duration::from_secs(30),
        );
        (orch, lister)
    }

    #[tokio::test]
    async fn one_failing_section_leaves_the_others_intact() {
        let (orch, _) = orchestrator(
            Some("devrel"),
            vec!["growth/plan.md", "devrel/talks.md", "handbook/pto.md"],
        );
        let reply = orch
            .build_response("growth: g question devrel: d question handbook: h question")
            .await;
        let blocks: Vec<&str> = reply.text.split("\n\n").collect();
        // growth block + devrel error block + handbook block (sources blocks
        // add two more separators for the successful sections).
        assert!(reply.text.contains("📂 *Growth*"));
        assert!(reply.text.contains("📂 *Devrel*"));
        assert!(reply.text.contains("📂 *Handbook*"));
        assert!(reply.text.contains("⚠️ Error: api:"));
        assert!(reply.text.contains("answer to: g question"));
        assert!(reply.text.contains("answer to: h question"));
        assert!(blocks.len() >= 3);
        assert!(reply.offer_feedback);
    }

    #[tokio::test]
    async fn sources_are_deduplicated_and_ordered() {
        let (orch, _) = orchestrator(None, vec!["handbook/pto.md"]);
        let reply = orch.build_response("handbook: how much pto").await;
        let sources_at = reply.text.find("Sources:").unwrap();
        let footer = &reply.text[sources_at..];
        assert_eq!(footer.matches("kb/doc.md").count(), 1);
        assert!(footer.find("kb/doc.md").unwrap() < footer.find("kb/other.md").unwrap());
    }

    #[tokio::test]
    async fn stats_command_renders_section_counts() {
        let (orch, _) = orchestrator(None, vec!["growth/a.md", "growth/b.md", "handbook/c.md"]);
        let reply = orch.build_response("  /Stats ").await;
        assert!(reply.text.contains("3 documents"));
        assert!(reply.text.contains("• growth: 2"));
        assert!(reply.text.contains("• handbook: 1"));
        assert!(!reply.offer_feedback);
    }

    #[tokio::test]
    async fn audit_command_lists_paths() {
        let (orch, _) = orchestrator(None, vec!["growth/a.md", "handbook/c.md"]);
        let reply = orch.build_response("!audit").await;
        assert!(reply.text.contains("Documents:"));
        assert!(reply.text.contains("• growth/a.md"));
    }

    #[tokio::test]
    async fn stats_are_cached_within_ttl() {
        let (orch, lister) = orchestrator(None, vec!["growth/a.md"]);
        orch.build_response("stats").await;
        orch.build_response("stats").await;
        assert_eq!(lister.calls.load(Ordering::SeqCst), 1);
        // A different command misses the cache.
        orch.build_response("audit").await;
        assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unlabeled_answer_has_no_header() {
        let (orch, _) = orchestrator(None, vec!["handbook/pto.md"]);
        let reply = orch.build_response("completely unrelated question").await;
        assert!(!reply.text.contains("📂"));
        assert!(reply.text.starts_with("answer to:"));
    }

    #[test]
    fn command_parsing_tolerates_decoration() {
        assert_eq!(parse_command("stats"), Some(Command::Stats));
        assert_eq!(parse_command("  /stats "), Some(Command::Stats));
        assert_eq!(parse_command("!AUDIT"), Some(Command::Audit));
        assert_eq!(parse_command("statistics"), None);
        assert_eq!(parse_command("show stats please"), None);
    }
}
