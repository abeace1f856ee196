use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use quern_core::config::SheetsConfig;
use quern_core::error::QuernError;
use quern_engine::{FeedbackRow, FeedbackSink};

use crate::error::SheetsError;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Appends feedback rows via `spreadsheets.values.append`.
///
/// The access token comes from config; acquiring/refreshing it is a
/// deployment concern, not this process's.
pub struct SheetsClient {
    http: reqwest::Client,
    access_token: String,
    spreadsheet_id: String,
    range: String,
}

impl SheetsClient {
    pub fn new(config: &SheetsConfig) -> Result<Self, SheetsError> {
        if config.access_token.trim().is_empty() {
            return Err(SheetsError::Config("sheets.access_token is empty".into()));
        }
        if config.spreadsheet_id.trim().is_empty() {
            return Err(SheetsError::Config("sheets.spreadsheet_id is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            access_token: config.access_token.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
        })
    }

    async fn append(&self, row: &FeedbackRow) -> Result<(), SheetsError> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            SHEETS_API_BASE, self.spreadsheet_id, self.range
        );
        let body = json!({ "values": [row.values()] });

        debug!(spreadsheet = %self.spreadsheet_id, "appending feedback row");
        let resp = self
            .http
            .post(&url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, "sheets append failed");
            return Err(SheetsError::Api { status, message });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedbackSink for SheetsClient {
    async fn append_row(&self, row: &FeedbackRow) -> Result<(), QuernError> {
        self.append(row).await?;
        Ok(())
    }
}

/// Sink used when the sheets integration is disabled: rows are logged and
/// dropped, so users still get their confirmation and nothing errors out.
pub struct LogOnlySink;

#[async_trait]
impl FeedbackSink for LogOnlySink {
    async fn append_row(&self, row: &FeedbackRow) -> Result<(), QuernError> {
        info!(
            user = %row.user_id,
            rating = %row.rating,
            "feedback received (sheets disabled, row not persisted)"
        );
        Ok(())
    }
}
