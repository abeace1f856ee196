//! Socket Mode event loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use quern_engine::EngineService;

use crate::api::SlackApiClient;
use crate::error::SlackError;
use crate::event::{normalize_message_event, SocketEnvelope};
use crate::feedback_ui::{self, FEEDBACK_ACTION_ID};

/// Drives the Socket Mode connection and feeds the engine.
///
/// Reconnects forever: Slack refreshes socket URLs periodically and sends a
/// `disconnect` envelope when it wants us to dial a fresh one, so dropping
/// out of a session is routine, not an error.
pub struct SlackAdapter {
    api: Arc<SlackApiClient>,
    engine: Arc<EngineService>,
    reconnect_delay: Duration,
}

impl SlackAdapter {
    pub fn new(
        api: Arc<SlackApiClient>,
        engine: Arc<EngineService>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            api,
            engine,
            reconnect_delay,
        }
    }

    /// Connect and keep reconnecting whenever the socket drops.
    ///
    /// Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        loop {
            let url = match self.api.open_socket_url().await {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "failed to open socket connection, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };

            info!("socket mode connecting");
            match self.run_session(&url).await {
                Ok(()) => info!("socket session ended, reconnecting"),
                Err(e) => warn!(error = %e, "socket session error, reconnecting"),
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn run_session(&self, url: &str) -> Result<(), SlackError> {
        let (stream, _response) = connect_async(url).await?;
        let (mut sink, mut source) = stream.split();

        while let Some(message) = source.next().await {
            match message? {
                WsMessage::Text(raw) => {
                    let envelope: SocketEnvelope = match serde_json::from_str(raw.as_ref()) {
                        Ok(env) => env,
                        Err(e) => {
                            debug!(error = %e, "unparseable socket frame skipped");
                            // An unacked envelope is redelivered until the
                            // session recycles, so ack by id when one is
                            // salvageable from the raw frame.
                            if let Some(id) = stray_envelope_id(raw.as_ref()) {
                                let ack = json!({ "envelope_id": id }).to_string();
                                sink.send(WsMessage::Text(ack.into())).await?;
                            }
                            continue;
                        }
                    };

                    if !envelope.envelope_id.is_empty() {
                        let ack = json!({ "envelope_id": envelope.envelope_id }).to_string();
                        sink.send(WsMessage::Text(ack.into())).await?;
                    }

                    match envelope.envelope_type.as_str() {
                        "events_api" => self.handle_events_api(&envelope.payload),
                        "interactive" => self.handle_interactive(envelope.payload),
                        "hello" => debug!("socket mode hello"),
                        "disconnect" => {
                            info!("disconnect requested by slack");
                            return Ok(());
                        }
                        other => debug!(envelope_type = %other, "ignoring envelope"),
                    }
                }
                WsMessage::Ping(data) => sink.send(WsMessage::Pong(data)).await?,
                WsMessage::Close(_) => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_events_api(&self, payload: &Value) {
        let Some(raw_event) = payload.get("event") else {
            return;
        };
        if let Some(event) = normalize_message_event(raw_event) {
            debug!(conversation = %event.conversation_id, "inbound dm event");
            self.engine.handle_event(event);
        }
    }

    /// Dispatch an interactive payload onto a worker task. The sink append
    /// and the Web API calls behind these can take seconds; the read loop
    /// must keep draining and acking envelopes meanwhile.
    fn handle_interactive(&self, payload: Value) {
        match payload.get("type").and_then(Value::as_str) {
            Some("block_actions") => {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    open_feedback_modal(api, payload).await;
                });
            }
            Some("view_submission") => {
                if let Some(submission) = feedback_ui::parse_view_submission(&payload) {
                    let engine = Arc::clone(&self.engine);
                    tokio::spawn(async move {
                        engine.submit_feedback(submission).await;
                    });
                }
            }
            _ => {}
        }
    }
}

/// The feedback button was pressed: open the rating modal, carrying the ids
/// of the message being rated in its private metadata.
async fn open_feedback_modal(api: Arc<SlackApiClient>, payload: Value) {
    let pressed_ours = payload
        .get("actions")
        .and_then(Value::as_array)
        .map(|actions| {
            actions
                .iter()
                .any(|a| a.get("action_id").and_then(Value::as_str) == Some(FEEDBACK_ACTION_ID))
        })
        .unwrap_or(false);
    if !pressed_ours {
        return;
    }

    let Some(trigger_id) = payload.get("trigger_id").and_then(Value::as_str) else {
        return;
    };
    let conversation_id = payload
        .pointer("/channel/id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message_id = payload
        .pointer("/container/message_ts")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let view = feedback_ui::feedback_modal(conversation_id, message_id);
    if let Err(e) = api.open_view(trigger_id, view).await {
        warn!(error = %e, "failed to open feedback modal");
    }
}

/// Best-effort `envelope_id` extraction from a frame that failed full
/// envelope parsing.
fn stray_envelope_id(raw: &str) -> Option<String> {
    serde_json::from_str::<Value>(raw)
        .ok()?
        .get("envelope_id")?
        .as_str()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quern_classify::SectionIndex;
    use quern_core::config::{ClassifyConfig, EngineConfig, SlackConfig};
    use quern_core::error::QuernError;
    use quern_engine::{AnswerOrchestrator, FeedbackRow, FeedbackSink, MessagePoster};
    use quern_kb::{Answer, AnswerProvider, DocumentLister, DocumentListing, KbError};
    use std::sync::Mutex;

    struct StubProvider;

    #[async_trait]
    impl AnswerProvider for StubProvider {
        async fn answer(&self, question: &str, _filter: Option<&str>) -> Result<Answer, KbError> {
            Ok(Answer {
                text: format!("answer to: {question}"),
                sources: Vec::new(),
            })
        }
    }

    struct StubLister;

    #[async_trait]
    impl DocumentLister for StubLister {
        async fn list_documents(&self) -> Result<DocumentListing, KbError> {
            Ok(DocumentListing::default())
        }
    }

    #[derive(Default)]
    struct NullPoster;

    #[async_trait]
    impl MessagePoster for NullPoster {
        async fn post(&self, _c: &str, _t: &str, _f: bool) -> Result<String, QuernError> {
            Ok("ts-1".to_string())
        }
        async fn notify(&self, _c: &str, _u: &str, _t: &str) -> Result<(), QuernError> {
            Ok(())
        }
    }

    /// Sink that takes a full minute per append.
    struct SlowSink {
        delay: Duration,
        rows: Mutex<Vec<FeedbackRow>>,
    }

    #[async_trait]
    impl FeedbackSink for SlowSink {
        async fn append_row(&self, row: &FeedbackRow) -> Result<(), QuernError> {
            tokio::time::sleep(self.delay).await;
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }
    }

    fn adapter_with(sink: Arc<SlowSink>) -> SlackAdapter {
        let config = SlackConfig {
            bot_token: "xoxb-test".into(),
            app_token: "xapp-test".into(),
            ..SlackConfig::default()
        };
        let orchestrator = AnswerOrchestrator::new(
            Arc::new(StubProvider),
            Arc::new(StubLister),
            Arc::new(SectionIndex::empty()),
            ClassifyConfig::default(),
            Duration::from_secs(30),
        );
        let engine = Arc::new(quern_engine::EngineService::new(
            &EngineConfig::default(),
            orchestrator,
            Arc::new(NullPoster),
            sink,
        ));
        SlackAdapter::new(
            Arc::new(SlackApiClient::new(&config).unwrap()),
            engine,
            Duration::from_secs(5),
        )
    }

    fn submission_payload() -> Value {
        json!({
            "type": "view_submission",
            "user": { "id": "U123" },
            "view": {
                "callback_id": feedback_ui::FEEDBACK_CALLBACK_ID,
                "private_metadata": "{\"conversation_id\":\"D042\",\"message_id\":\"1727.1\"}",
                "state": { "values": {
                    "rating_block": { "rating": { "selected_option": { "value": "4" } } }
                }}
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn slow_feedback_sink_does_not_stall_the_read_loop() {
        let sink = Arc::new(SlowSink {
            delay: Duration::from_secs(60),
            rows: Mutex::new(Vec::new()),
        });
        let adapter = adapter_with(Arc::clone(&sink));

        // Returns immediately: the submission runs on a spawned task.
        adapter.handle_interactive(submission_payload());
        assert!(sink.rows.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(61)).await;
        let rows = sink.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rating, "4");
    }

    #[test]
    fn ack_id_is_salvaged_from_malformed_envelopes() {
        // "type" is missing, so full envelope parsing fails.
        assert_eq!(
            stray_envelope_id(r#"{"envelope_id":"env-9","payload":{}}"#).as_deref(),
            Some("env-9")
        );
        assert_eq!(stray_envelope_id(r#"{"payload":{}}"#), None);
        assert_eq!(stray_envelope_id("not json at all"), None);
    }
}
