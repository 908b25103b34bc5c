use std::sync::Arc;

use crate::config::Config;
use crate::interview::feedback::FeedbackGenerator;
use crate::interview::orchestrator::InterviewOrchestrator;
use crate::speech::SpeechSynthesizer;
use crate::store::{ProviderConfigStore, SettingsStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Global AI switch, budgets and usage counters.
    pub settings: Arc<dyn SettingsStore>,
    /// Provider configs managed from the admin routes.
    pub providers: Arc<dyn ProviderConfigStore>,
    pub interviews: InterviewOrchestrator,
    pub feedback: FeedbackGenerator,
    pub speech: SpeechSynthesizer,
}
