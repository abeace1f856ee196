//! Socket Mode envelope parsing and event normalization.

use serde::Deserialize;
use serde_json::Value;

use quern_core::types::InboundEvent;

/// One Socket Mode envelope. Every envelope with an id must be acked
/// promptly or Slack redelivers it.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketEnvelope {
    #[serde(default)]
    pub envelope_id: String,
    #[serde(rename = "type")]
    pub envelope_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// The subset of a `message` event the gateway cares about.
#[derive(Debug, Clone, Deserialize)]
struct MessageEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    channel_type: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    client_msg_id: Option<String>,
    #[serde(default)]
    event_ts: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Normalize a raw `events_api` message event into an [`InboundEvent`].
///
/// Returns `None` for anything the engine must not see: bot echoes,
/// subtyped events (edits, joins, …) and non-DM channels. The dedup id is
/// the first non-empty of client_msg_id, event_ts, ts; an event carrying
/// none of them stays processable but is never deduplicated.
pub fn normalize_message_event(raw: &Value) -> Option<InboundEvent> {
    let event: MessageEvent = serde_json::from_value(raw.clone()).ok()?;

    if event.event_type != "message" {
        return None;
    }
    if event.bot_id.is_some() || event.subtype.is_some() {
        return None;
    }
    if event.channel_type.as_deref() != Some("im") {
        return None;
    }

    let conversation_id = event.channel?;
    let user_id = event.user.unwrap_or_default();
    let text = event.text.unwrap_or_default();

    let event_id = [event.client_msg_id, event.event_ts, event.ts]
        .into_iter()
        .flatten()
        .find(|id| !id.trim().is_empty());

    Some(InboundEvent {
        conversation_id,
        user_id,
        text,
        event_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dm_event() -> Value {
        json!({
            "type": "message",
            "channel": "D042ABC",
            "channel_type": "im",
            "user": "U123",
            "text": "hello there",
            "client_msg_id": "cmid-1",
            "event_ts": "1727.0001",
            "ts": "1727.0001"
        })
    }

    #[test]
    fn plain_dm_message_normalizes() {
        let ev = normalize_message_event(&dm_event()).unwrap();
        assert_eq!(ev.conversation_id, "D042ABC");
        assert_eq!(ev.user_id, "U123");
        assert_eq!(ev.text, "hello there");
        assert_eq!(ev.event_id.as_deref(), Some("cmid-1"));
    }

    #[test]
    fn bot_messages_are_filtered() {
        let mut raw = dm_event();
        raw["bot_id"] = json!("B999");
        assert!(normalize_message_event(&raw).is_none());
    }

    #[test]
    fn subtyped_events_are_filtered() {
        let mut raw = dm_event();
        raw["subtype"] = json!("message_changed");
        assert!(normalize_message_event(&raw).is_none());
    }

    #[test]
    fn non_dm_channels_are_filtered() {
        let mut raw = dm_event();
        raw["channel_type"] = json!("channel");
        assert!(normalize_message_event(&raw).is_none());
    }

    #[test]
    fn event_id_falls_back_to_timestamps() {
        let mut raw = dm_event();
        raw.as_object_mut().unwrap().remove("client_msg_id");
        let ev = normalize_message_event(&raw).unwrap();
        assert_eq!(ev.event_id.as_deref(), Some("1727.0001"));

        raw.as_object_mut().unwrap().remove("event_ts");
        raw.as_object_mut().unwrap().remove("ts");
        let ev = normalize_message_event(&raw).unwrap();
        assert_eq!(ev.event_id, None);
    }

    #[test]
    fn non_message_events_are_ignored() {
        let raw = json!({ "type": "reaction_added", "channel": "D042ABC" });
        assert!(normalize_message_event(&raw).is_none());
    }

    #[test]
    fn envelope_without_id_parses() {
        let raw = json!({ "type": "hello", "num_connections": 1 });
        let env: SocketEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(env.envelope_type, "hello");
        assert!(env.envelope_id.is_empty());
    }
}
