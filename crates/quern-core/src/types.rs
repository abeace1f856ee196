use serde::{Deserialize, Serialize};

/// A normalized message event handed from a transport adapter to the engine.
///
/// Adapters are responsible for filtering out everything the engine must not
/// see (bot echoes, edits/joins and other subtyped events, non-DM channels)
/// before constructing one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Platform-native conversation/channel identifier. Keys all
    /// per-conversation engine state.
    pub conversation_id: String,

    /// Platform-native identifier for the sender.
    pub user_id: String,

    /// Plain text content of the message.
    pub text: String,

    /// Best unique token available on the raw event, used for duplicate
    /// suppression. `None` means the platform gave us nothing usable; such
    /// events are never treated as duplicates.
    pub event_id: Option<String>,
}
