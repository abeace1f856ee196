//! `quern-kb` — knowledge-base collaborators.
//!
//! Defines the two seams the engine talks to — [`AnswerProvider`] for
//! retrieval-augmented answers and [`DocumentLister`] for store inventory —
//! plus the production implementation of both, [`GeminiKbClient`], which
//! drives the Gemini File Search API over HTTP.

pub mod client;
pub mod error;
pub mod gemini;

pub use client::{Answer, AnswerProvider, DocumentInfo, DocumentListing, DocumentLister};
pub use error::KbError;
pub use gemini::GeminiKbClient;
