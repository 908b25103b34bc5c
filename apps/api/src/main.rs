mod admin;
mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod speech;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::interview::feedback::FeedbackGenerator;
use crate::interview::orchestrator::InterviewOrchestrator;
use crate::llm_client::dispatch::AiDispatcher;
use crate::llm_client::resolver::ProviderConfigResolver;
use crate::llm_client::{AggregatorHeaders, LlmClient};
use crate::routes::build_router;
use crate::speech::SpeechSynthesizer;
use crate::state::AppState;
use crate::store::postgres::{PgProviderConfigStore, PgQuestionBankStore, PgSettingsStore};
use crate::store::{ProviderConfigStore, QuestionBankStore, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    let settings: Arc<dyn SettingsStore> = Arc::new(PgSettingsStore::new(db.clone()));
    let providers: Arc<dyn ProviderConfigStore> = Arc::new(PgProviderConfigStore::new(db.clone()));
    let question_banks: Arc<dyn QuestionBankStore> = Arc::new(PgQuestionBankStore::new(db));

    // Initialize LLM client
    let llm = LlmClient::new(
        Duration::from_secs(config.ai_request_timeout_secs),
        AggregatorHeaders {
            referer: config.aggregator_referer.clone(),
            title: config.aggregator_title.clone(),
            hosts: config.aggregator_hosts.clone(),
        },
    )?;
    info!(
        "LLM client initialized (default model: {}, timeout: {}s)",
        config.ai_api_model, config.ai_request_timeout_secs
    );

    let resolver =
        ProviderConfigResolver::new(settings.clone(), providers.clone(), config.static_defaults());
    let dispatcher = AiDispatcher::new(llm, resolver, providers.clone(), settings.clone());
    let speech = SpeechSynthesizer::new(
        dispatcher.llm().http().clone(),
        dispatcher.resolver().clone(),
    );

    if config.admin_token.is_none() {
        info!("ADMIN_TOKEN not set; admin routes are disabled");
    }

    // Build app state
    let state = AppState {
        config: config.clone(),
        settings,
        providers,
        interviews: InterviewOrchestrator::new(dispatcher.clone(), question_banks),
        feedback: FeedbackGenerator::new(dispatcher),
        speech,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
