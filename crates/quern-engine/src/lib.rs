//! `quern-engine` — the event-coalescing and routing core.
//!
//! # Flow
//!
//! ```text
//! inbound event → dedup (drop if seen) → debounce buffer (reset timer)
//!   → [quiet period] flush → orchestrator → post gate → outbound post
//!   → answer context recorded → (later) feedback submission → sink
//! ```
//!
//! All mutable bookkeeping (pending buffers, seen set, cooldowns, answer
//! contexts) lives behind one coarse lock inside [`EngineService`]; the lock
//! is never held across a network call. Collaborators are injected through
//! traits so tests drive the whole flow with fakes and a paused clock.

pub mod dedup;
pub mod feedback;
pub mod gate;
pub mod orchestrator;
pub mod service;

pub use feedback::{FeedbackRow, FeedbackSink, FeedbackSubmission};
pub use orchestrator::{AnswerBlock, AnswerOrchestrator, RenderedReply};
pub use service::{EngineCounters, EngineService, MessagePoster};
