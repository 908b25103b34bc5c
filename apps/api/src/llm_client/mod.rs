/// LLM Client: the single point of entry for chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call a provider's chat API directly.
/// Interview and feedback generation go through [`dispatch::AiDispatcher`], which
/// resolves the effective config and owns the key-rotation retry.
///
/// Wire format is the OpenAI-compatible `/chat/completions` shape.
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::resolver::EffectiveConfig;

pub mod dispatch;
pub mod prompts;
pub mod resolver;

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 500;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("No usable API key resolved")]
    ConfigurationMissing,

    #[error("Provider rate limited the request")]
    RateLimited,

    #[error("Provider rejected the credentials")]
    Unauthorized,

    #[error("Provider returned status {status}")]
    Status { status: u16 },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// Failures that a different key may fix.
    pub fn is_rotatable(&self) -> bool {
        matches!(self, UpstreamError::RateLimited | UpstreamError::Unauthorized)
    }

    /// Safe text shown to the candidate. Never includes upstream error details.
    pub fn user_message(&self) -> &'static str {
        match self {
            UpstreamError::ConfigurationMissing => prompts::NOT_CONFIGURED_MESSAGE,
            _ => prompts::UNAVAILABLE_MESSAGE,
        }
    }
}

/// One chat message in provider wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}

/// Text of a successful completion plus the provider-reported token total.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub total_tokens: Option<u32>,
}

/// Attribution headers sent only to aggregator hosts, i.e. hosts that route
/// to many upstream models.
#[derive(Debug, Clone)]
pub struct AggregatorHeaders {
    pub referer: String,
    pub title: String,
    /// Lowercase host suffixes; a URL matches on the host itself or a subdomain.
    pub hosts: Vec<String>,
}

impl AggregatorHeaders {
    fn applies_to(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| {
                self.hosts
                    .iter()
                    .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")))
            })
    }
}

/// HTTP client for OpenAI-compatible chat-completion endpoints.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    aggregator: AggregatorHeaders,
}

impl LlmClient {
    pub fn new(timeout: Duration, aggregator: AggregatorHeaders) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            aggregator,
        })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Makes exactly one POST to the provider. No retries here; the dispatcher
    /// decides whether a failure earns a rotated-key retry.
    pub async fn execute(
        &self,
        config: &EffectiveConfig,
        messages: &[ChatMessage],
    ) -> Result<Completion, UpstreamError> {
        let body = ChatCompletionRequest {
            model: &config.model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let mut request = self
            .client
            .post(&config.url)
            .bearer_auth(&config.key)
            .json(&body);
        if self.aggregator.applies_to(&config.url) {
            request = request
                .header("HTTP-Referer", &self.aggregator.referer)
                .header("X-Title", &self.aggregator.title);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(
                "Provider '{}' returned {}: {}",
                config.provider_label(),
                status,
                detail.chars().take(300).collect::<String>()
            );
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
                StatusCode::UNAUTHORIZED => UpstreamError::Unauthorized,
                other => UpstreamError::Status {
                    status: other.as_u16(),
                },
            });
        }

        let raw = response.text().await?;
        let completion = parse_completion(&raw)?;
        debug!(
            "Provider '{}' call succeeded: total_tokens={:?}",
            config.provider_label(),
            completion.total_tokens
        );
        Ok(completion)
    }
}

/// Requires `choices[0].message.content`; anything else is a contract violation.
fn parse_completion(raw: &str) -> Result<Completion, UpstreamError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(raw)
        .map_err(|e| UpstreamError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let text = parsed
        .choices
        .ok_or_else(|| UpstreamError::MalformedResponse("missing choices".to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::MalformedResponse("empty choices".to_string()))?
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| UpstreamError::MalformedResponse("missing message.content".to_string()))?;

    Ok(Completion {
        text,
        total_tokens: parsed.usage.and_then(|u| u.total_tokens),
    })
}

/// Rough token estimate (≈4 characters per token) for providers that omit usage.
pub fn estimate_tokens(messages: &[ChatMessage], reply: &str) -> i64 {
    let chars: usize = messages.iter().map(|m| m.content.len()).sum::<usize>() + reply.len();
    (chars / 4) as i64
}
