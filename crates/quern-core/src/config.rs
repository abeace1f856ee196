use std::collections::HashMap;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (quern.toml + QUERN_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuernConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub kb: KbConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-…`), used for Web API calls.
    #[serde(default)]
    pub bot_token: String,
    /// App-level token (`xapp-…`), used to open the Socket Mode connection.
    #[serde(default)]
    pub app_token: String,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Delay before reconnecting after the socket drops.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            app_token: String::new(),
            api_base: default_slack_api_base(),
            reconnect_secs: default_reconnect_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_kb_model")]
    pub model: String,
    /// File Search store resource names (e.g. `fileSearchStores/kb-xyz`).
    #[serde(default)]
    pub store_names: Vec<String>,
    #[serde(default = "default_kb_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_kb_model(),
            store_names: Vec::new(),
            api_base: default_kb_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// When false, feedback rows are logged and dropped instead of appended.
    #[serde(default)]
    pub enabled: bool,
    /// OAuth access token with the spreadsheets scope. Acquisition is out of
    /// scope here — see scripts/ in the deployment docs.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_range")]
    pub range: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            spreadsheet_id: String::new(),
            range: default_sheet_range(),
        }
    }
}

/// Timing knobs for the coalescing/routing engine. All intervals in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period before a buffered conversation is flushed.
    #[serde(default = "default_quiet_period_secs")]
    pub quiet_period_secs: f64,
    /// Minimum interval between outbound posts per conversation.
    #[serde(default = "default_post_cooldown_secs")]
    pub post_cooldown_secs: f64,
    /// How long a processed event id is remembered for duplicate suppression.
    #[serde(default = "default_seen_ttl_secs")]
    pub seen_ttl_secs: f64,
    /// Minimum interval between feedback submissions per user.
    #[serde(default = "default_feedback_cooldown_secs")]
    pub feedback_cooldown_secs: f64,
    /// How long a rendered stats summary is served from cache.
    #[serde(default = "default_stats_cache_ttl_secs")]
    pub stats_cache_ttl_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_period_secs: default_quiet_period_secs(),
            post_cooldown_secs: default_post_cooldown_secs(),
            seen_ttl_secs: default_seen_ttl_secs(),
            feedback_cooldown_secs: default_feedback_cooldown_secs(),
            stats_cache_ttl_secs: default_stats_cache_ttl_secs(),
        }
    }
}

impl EngineConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs_f64(self.quiet_period_secs)
    }
    pub fn post_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.post_cooldown_secs)
    }
    pub fn seen_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.seen_ttl_secs)
    }
    pub fn feedback_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.feedback_cooldown_secs)
    }
    pub fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.stats_cache_ttl_secs)
    }
}

/// Scoring policy for the section-inference fallback.
///
/// Different deployments disagree on the exact constants, so they are config
/// rather than code. Defaults: +5 for a whole-word section name hit, +1 per
/// indexed token, accept at a total of 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    #[serde(default = "default_name_weight")]
    pub name_weight: u32,
    #[serde(default = "default_token_weight")]
    pub token_weight: u32,
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    /// Metadata key used in generated filter predicates
    /// (`department="growth"`).
    #[serde(default = "default_filter_key")]
    pub filter_key: String,
    /// Extra alias → canonical section mappings on top of the generated
    /// singular forms.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            name_weight: default_name_weight(),
            token_weight: default_token_weight(),
            min_score: default_min_score(),
            filter_key: default_filter_key(),
            aliases: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address for the /health listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_kb_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_kb_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_sheet_range() -> String {
    "Feedback!A:F".to_string()
}
fn default_reconnect_secs() -> f64 {
    5.0
}
fn default_request_timeout_secs() -> f64 {
    30.0
}
fn default_quiet_period_secs() -> f64 {
    3.5
}
fn default_post_cooldown_secs() -> f64 {
    1.0
}
fn default_seen_ttl_secs() -> f64 {
    90.0
}
fn default_feedback_cooldown_secs() -> f64 {
    30.0
}
fn default_stats_cache_ttl_secs() -> f64 {
    30.0
}
fn default_name_weight() -> u32 {
    5
}
fn default_token_weight() -> u32 {
    1
}
fn default_min_score() -> u32 {
    2
}
fn default_filter_key() -> String {
    "department".to_string()
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8070
}

impl Default for QuernConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig::default(),
            kb: KbConfig::default(),
            sheets: SheetsConfig::default(),
            engine: EngineConfig::default(),
            classify: ClassifyConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl QuernConfig {
    /// Load config from a TOML file with QUERN_* env var overrides.
    ///
    /// Nested keys use a double underscore in the env form, e.g.
    /// `QUERN_SLACK__BOT_TOKEN` → `slack.bot_token`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: QuernConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("QUERN_").split("__"))
            .extract()
            .map_err(|e| crate::error::QuernError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Fail fast when required credentials are missing. The process must not
    /// start accepting events on a half-configured deployment.
    pub fn validate(&self) -> crate::error::Result<()> {
        let mut missing = Vec::new();
        if self.slack.bot_token.trim().is_empty() {
            missing.push("slack.bot_token");
        }
        if self.slack.app_token.trim().is_empty() {
            missing.push("slack.app_token");
        }
        if self.kb.api_key.trim().is_empty() {
            missing.push("kb.api_key");
        }
        if self.kb.store_names.is_empty() {
            missing.push("kb.store_names");
        }
        if self.sheets.enabled {
            if self.sheets.access_token.trim().is_empty() {
                missing.push("sheets.access_token");
            }
            if self.sheets.spreadsheet_id.trim().is_empty() {
                missing.push("sheets.spreadsheet_id");
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::error::QuernError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.quern/quern.toml", home)
}
