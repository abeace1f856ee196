//! `quern-sheets` — spreadsheet feedback sink.
//!
//! Appends one row per feedback submission to a Google Sheets range. When
//! the sheets integration is disabled, [`LogOnlySink`] keeps the feedback
//! flow alive by logging rows instead of persisting them.

pub mod client;
pub mod error;

pub use client::{LogOnlySink, SheetsClient};
pub use error::SheetsError;
