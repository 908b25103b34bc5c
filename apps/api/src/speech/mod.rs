//! Interviewer voice via ElevenLabs text-to-speech.
//!
//! Uses the same resolver as chat calls with `ProviderType::Tts`; the voice id
//! travels in the `model` slot. Synthesis is best effort: any failure means
//! "no audio" and the caller falls back to text.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::llm_client::resolver::{ConfigSource, EffectiveConfig, ProviderConfigResolver};
use crate::models::provider::ProviderType;
use crate::state::AppState;

pub const TTS_MODEL_ID: &str = "eleven_multilingual_v2";

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: VoiceSettings,
}

#[derive(Clone)]
pub struct SpeechSynthesizer {
    http: Client,
    resolver: ProviderConfigResolver,
}

impl SpeechSynthesizer {
    pub fn new(http: Client, resolver: ProviderConfigResolver) -> Self {
        Self { http, resolver }
    }

    async fn effective_config(&self) -> EffectiveConfig {
        let config = self.resolver.resolve(ProviderType::Tts).await;
        // The legacy "any active" tier may hold a chat provider.
        match config.backing.as_ref() {
            Some(backing)
                if config.source == ConfigSource::LegacyConfig
                    && backing.provider_type != ProviderType::Tts =>
            {
                info!(
                    "TTS AI: ignoring non-TTS provider '{}', using static default",
                    backing.provider_name
                );
                self.resolver.static_default(ProviderType::Tts)
            }
            _ => config,
        }
    }

    /// Returns MP3 bytes, or `None` when TTS is unconfigured or the provider failed.
    pub async fn synthesize(&self, text: &str) -> Option<Bytes> {
        let config = self.effective_config().await;
        if !config.has_usable_key() {
            warn!("ElevenLabs API key not configured. Skipping TTS.");
            return None;
        }

        let url = format!("{}/{}", config.url.trim_end_matches('/'), config.model);
        let body = SynthesisBody {
            text,
            model_id: TTS_MODEL_ID,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let response = match self
            .http
            .post(&url)
            .header("xi-api-key", &config.key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Error generating audio with '{}': {e}", config.provider_label());
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("TTS provider '{}' returned status {status}", config.provider_label());
            return None;
        }

        match response.bytes().await {
            Ok(audio) if !audio.is_empty() => {
                info!("Generated audio for text length {}", text.chars().count());
                Some(audio)
            }
            Ok(_) => {
                warn!("TTS provider '{}' returned an empty body", config.provider_label());
                None
            }
            Err(e) => {
                error!("Failed to read TTS audio body: {e}");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

/// POST /api/ai/tts
pub async fn handle_tts(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Response, AppError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }

    Ok(match state.speech.synthesize(text).await {
        Some(audio) => ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
