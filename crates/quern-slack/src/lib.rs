//! `quern-slack` — Slack Socket Mode transport adapter.
//!
//! Bridges Slack to the engine: the socket loop reads and acks event
//! envelopes, direct-message events are normalized into the engine's
//! inbound type, and the Web API client implements the engine's outbound
//! [`MessagePoster`](quern_engine::MessagePoster) seam. The feedback round
//! trip (button → modal → submission) also lives here.

pub mod api;
pub mod error;
pub mod event;
pub mod feedback_ui;
pub mod socket;

pub use api::SlackApiClient;
pub use error::SlackError;
pub use socket::SlackAdapter;
