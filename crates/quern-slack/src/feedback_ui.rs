//! Block Kit payloads for the feedback round trip.
//!
//! Answer messages carry a "Rate this answer" button; pressing it opens a
//! modal whose `private_metadata` smuggles the conversation and message ids
//! through Slack, so the eventual `view_submission` can be correlated back
//! to the original exchange.

use serde_json::{json, Value};

use quern_engine::FeedbackSubmission;

/// `action_id` of the rate button on answer messages.
pub const FEEDBACK_ACTION_ID: &str = "quern_rate_answer";
/// `callback_id` of the feedback modal.
pub const FEEDBACK_CALLBACK_ID: &str = "quern_feedback_submit";

const RATING_BLOCK_ID: &str = "rating_block";
const RATING_ACTION_ID: &str = "rating";
const COMMENT_BLOCK_ID: &str = "comment_block";
const COMMENT_ACTION_ID: &str = "comment";

/// Message blocks for an answer, optionally with the feedback button.
pub fn answer_blocks(text: &str, offer_feedback: bool) -> Value {
    let mut blocks = vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text }
    })];
    if offer_feedback {
        blocks.push(json!({
            "type": "actions",
            "elements": [{
                "type": "button",
                "action_id": FEEDBACK_ACTION_ID,
                "text": { "type": "plain_text", "text": "Rate this answer" }
            }]
        }));
    }
    Value::Array(blocks)
}

/// The feedback modal view. `conversation_id` and `message_id` identify the
/// answer being rated.
pub fn feedback_modal(conversation_id: &str, message_id: &str) -> Value {
    let metadata = json!({
        "conversation_id": conversation_id,
        "message_id": message_id,
    });
    let rating_options: Vec<Value> = (1..=5)
        .map(|n| {
            json!({
                "text": { "type": "plain_text", "text": format!("{} {}", "⭐".repeat(n), n) },
                "value": n.to_string()
            })
        })
        .collect();

    json!({
        "type": "modal",
        "callback_id": FEEDBACK_CALLBACK_ID,
        "private_metadata": metadata.to_string(),
        "title": { "type": "plain_text", "text": "Rate this answer" },
        "submit": { "type": "plain_text", "text": "Send" },
        "close": { "type": "plain_text", "text": "Cancel" },
        "blocks": [
            {
                "type": "input",
                "block_id": RATING_BLOCK_ID,
                "label": { "type": "plain_text", "text": "How useful was the answer?" },
                "element": {
                    "type": "static_select",
                    "action_id": RATING_ACTION_ID,
                    "options": rating_options
                }
            },
            {
                "type": "input",
                "block_id": COMMENT_BLOCK_ID,
                "optional": true,
                "label": { "type": "plain_text", "text": "Anything to add?" },
                "element": {
                    "type": "plain_text_input",
                    "action_id": COMMENT_ACTION_ID,
                    "multiline": true
                }
            }
        ]
    })
}

/// Extract a [`FeedbackSubmission`] from a `view_submission` payload.
/// Returns `None` for other callbacks or malformed state.
pub fn parse_view_submission(payload: &Value) -> Option<FeedbackSubmission> {
    let view = payload.get("view")?;
    if view.get("callback_id").and_then(Value::as_str) != Some(FEEDBACK_CALLBACK_ID) {
        return None;
    }

    let metadata: Value = view
        .get("private_metadata")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str(raw).ok())?;
    let conversation_id = metadata.get("conversation_id")?.as_str()?.to_string();
    let message_id = metadata.get("message_id")?.as_str()?.to_string();

    let user_id = payload
        .pointer("/user/id")
        .and_then(Value::as_str)?
        .to_string();

    let values = view.pointer("/state/values")?;
    let rating = values
        .pointer(&format!(
            "/{RATING_BLOCK_ID}/{RATING_ACTION_ID}/selected_option/value"
        ))
        .and_then(Value::as_str)?
        .to_string();
    let comment = values
        .pointer(&format!("/{COMMENT_BLOCK_ID}/{COMMENT_ACTION_ID}/value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(FeedbackSubmission {
        message_id,
        conversation_id,
        user_id,
        rating,
        comment,
    })
}
