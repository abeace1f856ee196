//! The engine service: one object per process, one lock for all state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use quern_core::config::EngineConfig;
use quern_core::error::QuernError;
use quern_core::types::InboundEvent;

use crate::dedup::SeenSet;
use crate::feedback::{ContextStore, FeedbackRow, FeedbackSink, FeedbackSubmission};
use crate::gate::CooldownMap;
use crate::orchestrator::AnswerOrchestrator;

/// Outbound capability implemented by the transport adapter.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    /// Post `text` into a conversation. When `offer_feedback` is set the
    /// adapter attaches its feedback affordance (e.g. a "rate this answer"
    /// button). Returns the platform message id.
    async fn post(
        &self,
        conversation_id: &str,
        text: &str,
        offer_feedback: bool,
    ) -> Result<String, QuernError>;

    /// Short notice visible only to `user_id` inside the conversation.
    async fn notify(
        &self,
        conversation_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), QuernError>;
}

/// A buffered conversation awaiting its quiet-period flush.
struct PendingFlush {
    text: String,
    timer: JoinHandle<()>,
}

/// Everything mutable, behind the one coarse lock. Each handler acquires the
/// lock exactly for its read-modify-write step and releases it before any
/// network call.
struct EngineState {
    pending: HashMap<String, PendingFlush>,
    seen: SeenSet,
    post_gate: CooldownMap,
    feedback_gate: CooldownMap,
    contexts: ContextStore,
}

/// Snapshot of engine bookkeeping for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineCounters {
    pub buffered_conversations: usize,
    pub seen_events: usize,
    pub answer_contexts: usize,
}

/// The coalescing/routing engine. Instantiated once per process and shared
/// as `Arc<EngineService>` between the transport adapter and the gateway.
pub struct EngineService {
    state: Mutex<EngineState>,
    orchestrator: AnswerOrchestrator,
    poster: Arc<dyn MessagePoster>,
    sink: Arc<dyn FeedbackSink>,
    quiet_period: Duration,
}

impl EngineService {
    pub fn new(
        config: &EngineConfig,
        orchestrator: AnswerOrchestrator,
        poster: Arc<dyn MessagePoster>,
        sink: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState {
                pending: HashMap::new(),
                seen: SeenSet::new(config.seen_ttl()),
                post_gate: CooldownMap::new(config.post_cooldown()),
                feedback_gate: CooldownMap::new(config.feedback_cooldown()),
                contexts: ContextStore::default(),
            }),
            orchestrator,
            poster,
            sink,
            quiet_period: config.quiet_period(),
        }
    }

    /// Accept a normalized inbound event: drop duplicates, then buffer the
    /// text and (re)arm the conversation's flush timer. Last write wins —
    /// a burst of edits/keystrokes collapses into a single flush carrying
    /// only the final text.
    ///
    /// Must be called from within the Tokio runtime (spawns the timer task).
    pub fn handle_event(self: &Arc<Self>, event: InboundEvent) {
        if event.text.trim().is_empty() {
            return;
        }
        let now = Instant::now();

        let mut state = self.state.lock().unwrap();
        if state.seen.check_and_insert(event.event_id.as_deref(), now) {
            debug!(
                conversation = %event.conversation_id,
                event_id = ?event.event_id,
                "duplicate event dropped"
            );
            return;
        }

        let timer = tokio::spawn({
            let service = Arc::clone(self);
            let conversation_id = event.conversation_id.clone();
            async move {
                tokio::time::sleep(service.quiet_period).await;
                service.flush(&conversation_id).await;
            }
        });

        if let Some(previous) = state.pending.insert(
            event.conversation_id.clone(),
            PendingFlush {
                text: event.text,
                timer,
            },
        ) {
            // Best-effort cancel; a timer already mid-fire will find an
            // empty buffer and no-op.
            previous.timer.abort();
        }
    }

    /// Flush a conversation's buffer: pop atomically, build the reply
    /// outside the lock, then post through the cooldown gate. Normally
    /// driven by the debounce timer; a flush that loses the race to another
    /// one finds the buffer empty and does nothing.
    pub async fn flush(&self, conversation_id: &str) {
        let popped = {
            let mut state = self.state.lock().unwrap();
            state.pending.remove(conversation_id)
        };
        let Some(pending) = popped else {
            return;
        };

        debug!(conversation = %conversation_id, "flushing coalesced message");
        let reply = self.orchestrator.build_response(&pending.text).await;
        if reply.text.trim().is_empty() {
            return;
        }

        {
            let mut state = self.state.lock().unwrap();
            if !state.post_gate.try_acquire(conversation_id, Instant::now()) {
                debug!(conversation = %conversation_id, "post suppressed by cooldown");
                return;
            }
        }

        match self
            .poster
            .post(conversation_id, &reply.text, reply.offer_feedback)
            .await
        {
            Ok(message_id) => {
                if reply.offer_feedback {
                    let mut state = self.state.lock().unwrap();
                    let answer_id =
                        state
                            .contexts
                            .record(&message_id, pending.text, reply.text);
                    debug!(%message_id, %answer_id, "answer context recorded");
                }
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "outbound post failed");
            }
        }
    }

    /// Handle a feedback submission. The per-user cooldown is consumed by
    /// the attempt itself — a failing sink does not grant an instant retry.
    /// An unknown message id still produces a row, with blank prompt and
    /// response.
    pub async fn submit_feedback(&self, submission: FeedbackSubmission) {
        let now = Instant::now();
        let (rate_limited, context) = {
            let mut state = self.state.lock().unwrap();
            if state.feedback_gate.try_acquire(&submission.user_id, now) {
                (false, state.contexts.lookup(&submission.message_id).cloned())
            } else {
                (true, None)
            }
        };

        if rate_limited {
            debug!(user = %submission.user_id, "feedback rate-limited");
            self.quiet_notify(
                &submission.conversation_id,
                &submission.user_id,
                "You're sending feedback a bit too quickly — please try again in a moment.",
            )
            .await;
            return;
        }

        let (prompt, response) = context
            .map(|c| (c.prompt, c.response))
            .unwrap_or_default();
        let row = FeedbackRow {
            submitted_at: Utc::now().to_rfc3339(),
            user_id: submission.user_id.clone(),
            rating: submission.rating.clone(),
            comment: submission.comment.clone(),
            prompt,
            response,
        };

        match self.sink.append_row(&row).await {
            Ok(()) => {
                info!(user = %submission.user_id, rating = %submission.rating, "feedback recorded");
                self.quiet_notify(
                    &submission.conversation_id,
                    &submission.user_id,
                    "Thanks — your feedback was recorded. 🙏",
                )
                .await;
            }
            Err(e) => {
                warn!(user = %submission.user_id, error = %e, "feedback sink failed");
                self.quiet_notify(
                    &submission.conversation_id,
                    &submission.user_id,
                    "Sorry, your feedback couldn't be saved. Please try again later.",
                )
                .await;
            }
        }
    }

    /// Bookkeeping sizes for the health endpoint.
    pub fn counters(&self) -> EngineCounters {
        let state = self.state.lock().unwrap();
        EngineCounters {
            buffered_conversations: state.pending.len(),
            seen_events: state.seen.len(),
            answer_contexts: state.contexts.len(),
        }
    }

    async fn quiet_notify(&self, conversation_id: &str, user_id: &str, text: &str) {
        if let Err(e) = self.poster.notify(conversation_id, user_id, text).await {
            debug!(conversation = %conversation_id, error = %e, "notify failed");
        }
    }
}
