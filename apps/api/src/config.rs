use anyhow::{Context, Result};

use crate::llm_client::resolver::{DefaultProvider, StaticDefaults};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub ai_api_url: String,
    pub ai_api_key: String,
    pub ai_api_model: String,
    pub elevenlabs_api_url: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,
    /// Upper bound on each outbound provider call.
    pub ai_request_timeout_secs: u64,
    pub aggregator_referer: String,
    pub aggregator_title: String,
    /// Host suffixes that receive the attribution headers.
    pub aggregator_hosts: Vec<String>,
    /// Bearer token for /api/admin routes. Admin routes are closed when unset.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            ai_api_url: env_or(
                "AI_API_URL",
                "https://api.groq.com/openai/v1/chat/completions",
            ),
            ai_api_key: env_or("AI_API_KEY", ""),
            ai_api_model: env_or("AI_API_MODEL", "llama-3.3-70b-versatile"),
            elevenlabs_api_url: env_or(
                "ELEVENLABS_API_URL",
                "https://api.elevenlabs.io/v1/text-to-speech",
            ),
            elevenlabs_api_key: env_or("ELEVENLABS_API_KEY", ""),
            elevenlabs_voice_id: env_or("ELEVENLABS_VOICE_ID", "21m00Tcm4TlvDq8ikWAM"),
            ai_request_timeout_secs: env_or("AI_REQUEST_TIMEOUT_SECS", "15")
                .parse::<u64>()
                .context("AI_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            aggregator_referer: env_or("AGGREGATOR_REFERER", "https://resume-builder.com"),
            aggregator_title: env_or("AGGREGATOR_TITLE", "Resume Builder AI"),
            aggregator_hosts: split_list(&env_or("AGGREGATOR_HOSTS", "openrouter.ai")),
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        })
    }

    /// Deployment-baked provider settings used when no DB config applies.
    pub fn static_defaults(&self) -> StaticDefaults {
        StaticDefaults {
            chat: DefaultProvider {
                url: self.ai_api_url.clone(),
                key: self.ai_api_key.clone(),
                model: self.ai_api_model.clone(),
            },
            tts: DefaultProvider {
                url: self.elevenlabs_api_url.clone(),
                key: self.elevenlabs_api_key.clone(),
                model: self.elevenlabs_voice_id.clone(),
            },
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
