//! `quern-classify` — knowledge-base section routing.
//!
//! A coalesced message is turned into one or more `(section, query)` pairs:
//! explicit `section:` prefixes win, token-overlap inference against the
//! [`SectionIndex`] is the fallback, and an unlabeled query covers the rest.
//!
//! The index is built exactly once at startup from a document listing and is
//! immutable afterwards, so classification is a pure function of its inputs.

pub mod classify;
pub mod index;

pub use classify::{classify, SectionQuery};
pub use index::SectionIndex;
