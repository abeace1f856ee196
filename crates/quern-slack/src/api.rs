//! Slack Web API client.
//!
//! Thin wrapper over the handful of methods the gateway needs. Slack wraps
//! failures in HTTP 200 + `ok: false`, so every call checks the envelope
//! and surfaces the `error` string.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use quern_core::config::SlackConfig;
use quern_core::error::QuernError;
use quern_engine::MessagePoster;

use crate::error::SlackError;
use crate::feedback_ui;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenConnectionResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    app_token: String,
}

impl SlackApiClient {
    pub fn new(config: &SlackConfig) -> Result<Self, SlackError> {
        if config.bot_token.trim().is_empty() || config.app_token.trim().is_empty() {
            return Err(SlackError::Config("slack tokens are not set".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
        })
    }

    /// Resolve the bot's own user id (sanity check at startup — fails early
    /// on a bad bot token).
    pub async fn auth_test(&self) -> Result<String, SlackError> {
        let resp: AuthTestResponse = self.call("auth.test", &self.bot_token, &json!({})).await?;
        if !resp.ok {
            return Err(api_error("auth.test", resp.error));
        }
        resp.user_id
            .ok_or_else(|| SlackError::Parse("auth.test returned no user_id".into()))
    }

    /// Open a Socket Mode connection; returns the wss URL to dial.
    pub async fn open_socket_url(&self) -> Result<String, SlackError> {
        let resp: OpenConnectionResponse = self
            .call("apps.connections.open", &self.app_token, &json!({}))
            .await?;
        if !resp.ok {
            return Err(api_error("apps.connections.open", resp.error));
        }
        resp.url
            .ok_or_else(|| SlackError::Parse("apps.connections.open returned no url".into()))
    }

    /// Post a message; returns its `ts`, Slack's message id.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<String, SlackError> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(blocks) = blocks {
            body["blocks"] = blocks;
        }
        let resp: PostMessageResponse = self
            .call("chat.postMessage", &self.bot_token, &body)
            .await?;
        if !resp.ok {
            return Err(api_error("chat.postMessage", resp.error));
        }
        resp.ts
            .ok_or_else(|| SlackError::Parse("chat.postMessage returned no ts".into()))
    }

    /// Post an ephemeral notice visible only to `user`.
    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), SlackError> {
        let body = json!({ "channel": channel, "user": user, "text": text });
        let resp: ApiEnvelope = self
            .call("chat.postEphemeral", &self.bot_token, &body)
            .await?;
        if !resp.ok {
            return Err(api_error("chat.postEphemeral", resp.error));
        }
        Ok(())
    }

    /// Open a modal for the interaction behind `trigger_id`.
    pub async fn open_view(&self, trigger_id: &str, view: Value) -> Result<(), SlackError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        let resp: ApiEnvelope = self.call("views.open", &self.bot_token, &body).await?;
        if !resp.ok {
            return Err(api_error("views.open", resp.error));
        }
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        body: &Value,
    ) -> Result<T, SlackError> {
        debug!(%method, "slack api call");
        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SlackError::Api {
                method: method.to_string(),
                message: format!("HTTP {status}: {message}"),
            });
        }
        resp.json().await.map_err(|e| SlackError::Parse(e.to_string()))
    }
}

fn api_error(method: &str, error: Option<String>) -> SlackError {
    SlackError::Api {
        method: method.to_string(),
        message: error.unwrap_or_else(|| "unknown error".to_string()),
    }
}

/// The engine's outbound seam, implemented directly on the Web API client.
#[async_trait]
impl MessagePoster for SlackApiClient {
    async fn post(
        &self,
        conversation_id: &str,
        text: &str,
        offer_feedback: bool,
    ) -> Result<String, QuernError> {
        let blocks = feedback_ui::answer_blocks(text, offer_feedback);
        let ts = self
            .post_message(conversation_id, text, Some(blocks))
            .await?;
        Ok(ts)
    }

    async fn notify(
        &self,
        conversation_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), QuernError> {
        self.post_ephemeral(conversation_id, user_id, text).await?;
        Ok(())
    }
}
