use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use quern_classify::SectionIndex;
use quern_core::config::QuernConfig;
use quern_engine::{AnswerOrchestrator, EngineService, FeedbackSink, MessagePoster};
use quern_kb::{AnswerProvider, DocumentLister, GeminiKbClient};
use quern_sheets::{LogOnlySink, SheetsClient};
use quern_slack::{SlackAdapter, SlackApiClient};

mod app;
mod health;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quern_gateway=info,quern_engine=info,quern_slack=info".into()),
        )
        .init();

    // load config: QUERN_CONFIG env > ~/.quern/quern.toml, QUERN_* overrides
    let config_path = std::env::var("QUERN_CONFIG").ok();
    let config = QuernConfig::load(config_path.as_deref()).context("loading config")?;
    // a half-configured deployment must not start accepting events
    config.validate().context("validating config")?;

    let kb = Arc::new(GeminiKbClient::new(&config.kb).context("building knowledge-base client")?);
    let slack_api = Arc::new(SlackApiClient::new(&config.slack).context("building Slack client")?);

    let bot_user = slack_api.auth_test().await.context("slack auth.test")?;
    info!(bot_user = %bot_user, "Slack credentials verified");

    // One-shot section index build. A listing failure degrades routing to
    // unlabeled queries rather than blocking startup.
    let lister: Arc<dyn DocumentLister> = kb.clone();
    let index = match lister.list_documents().await {
        Ok(listing) => {
            let index = SectionIndex::build(&listing, &config.classify);
            info!(
                documents = listing.count,
                sections = index.sections().count(),
                "section index built"
            );
            index
        }
        Err(e) => {
            warn!(error = %e, "document listing failed, starting with an empty section index");
            SectionIndex::empty()
        }
    };

    let orchestrator = AnswerOrchestrator::new(
        kb.clone() as Arc<dyn AnswerProvider>,
        lister,
        Arc::new(index),
        config.classify.clone(),
        config.engine.stats_cache_ttl(),
    );

    let sink: Arc<dyn FeedbackSink> = if config.sheets.enabled {
        Arc::new(SheetsClient::new(&config.sheets).context("building Sheets client")?)
    } else {
        info!("sheets integration disabled, feedback rows will be logged only");
        Arc::new(LogOnlySink)
    };

    let engine = Arc::new(EngineService::new(
        &config.engine,
        orchestrator,
        slack_api.clone() as Arc<dyn MessagePoster>,
        sink,
    ));

    let adapter = SlackAdapter::new(
        slack_api,
        Arc::clone(&engine),
        Duration::from_secs_f64(config.slack.reconnect_secs),
    );
    tokio::spawn(adapter.run());
    info!("Slack Socket Mode adapter started");

    let state = Arc::new(app::AppState {
        engine: Arc::clone(&engine),
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port)
        .parse()
        .context("parsing gateway bind address")?;
    info!("Quern gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
