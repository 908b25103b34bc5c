//! Resilient dispatch: resolve → call → on 429/401 rotate the key, persist,
//! re-resolve and retry exactly once.
//!
//! At most two upstream calls are made per dispatch.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::llm_client::resolver::{EffectiveConfig, ProviderConfigResolver};
use crate::llm_client::{estimate_tokens, ChatMessage, Completion, LlmClient, UpstreamError};
use crate::models::provider::{ProviderConfig, ProviderType};
use crate::store::{ProviderConfigStore, SettingsStore};

#[derive(Clone)]
pub struct AiDispatcher {
    llm: LlmClient,
    resolver: ProviderConfigResolver,
    providers: Arc<dyn ProviderConfigStore>,
    settings: Arc<dyn SettingsStore>,
}

impl AiDispatcher {
    pub fn new(
        llm: LlmClient,
        resolver: ProviderConfigResolver,
        providers: Arc<dyn ProviderConfigStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            llm,
            resolver,
            providers,
            settings,
        }
    }

    pub fn resolver(&self) -> &ProviderConfigResolver {
        &self.resolver
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    /// Sends `messages` to the provider resolved for `provider_type` and returns
    /// the reply text. Errors carry a safe `user_message()` for the caller.
    pub async fn complete(
        &self,
        provider_type: ProviderType,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        let config = self.resolver.resolve(provider_type).await;
        if !config.has_usable_key() {
            warn!("{provider_type} AI: no usable API key configured");
            return Err(UpstreamError::ConfigurationMissing);
        }

        let first = self.llm.execute(&config, messages).await;
        let (config, completion) = match first {
            Ok(completion) => (config, completion),
            Err(e) => {
                error!(
                    "{provider_type} AI: call to '{}' failed: {e}",
                    config.provider_label()
                );
                let Some(backing) = config.backing.as_ref().filter(|_| e.is_rotatable()) else {
                    return Err(e);
                };
                if !backing.can_rotate() {
                    warn!(
                        "{provider_type} AI: '{}' has a single key, not retrying",
                        backing.provider_name
                    );
                    return Err(e);
                }

                self.rotate(backing).await;

                let retry_config = self.resolver.resolve(provider_type).await;
                if !retry_config.has_usable_key() {
                    return Err(UpstreamError::ConfigurationMissing);
                }
                info!(
                    "{provider_type} AI: retrying with rotated key on '{}'",
                    retry_config.provider_label()
                );
                match self.llm.execute(&retry_config, messages).await {
                    Ok(completion) => (retry_config, completion),
                    Err(retry_err) => {
                        error!("{provider_type} AI: retry failed: {retry_err}");
                        return Err(retry_err);
                    }
                }
            }
        };

        self.record_usage(&config, messages, &completion).await;
        Ok(completion.text)
    }

    /// Advances the key index of `backing` and persists it with a version check.
    /// A lost race is logged; the next resolve picks up whichever write won.
    async fn rotate(&self, backing: &ProviderConfig) {
        let Some(rotated) = backing.rotated() else {
            return;
        };
        match self.providers.save(&rotated).await {
            Ok(Some(saved)) => warn!(
                "Rate limit or auth failure on '{}'. Rotated to key index {}",
                saved.provider_name, saved.current_key_index
            ),
            Ok(None) => warn!(
                "Key rotation for '{}' lost a concurrent update (version {}); using stored index",
                backing.provider_name, backing.version
            ),
            Err(e) => error!(
                "Failed to persist key rotation for '{}': {e:#}",
                backing.provider_name
            ),
        }
    }

    /// Budget accounting applies to calls made through DB provider configs.
    async fn record_usage(
        &self,
        config: &EffectiveConfig,
        messages: &[ChatMessage],
        completion: &Completion,
    ) {
        if config.backing.is_none() {
            return;
        }
        let tokens = completion
            .total_tokens
            .map(i64::from)
            .unwrap_or_else(|| estimate_tokens(messages, &completion.text));
        if let Err(e) = self.settings.record_token_usage(tokens).await {
            warn!("Failed to record token usage: {e:#}");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm_client::resolver::tests::{provider, test_defaults};
    use crate::llm_client::resolver::StaticDefaults;
    use crate::llm_client::AggregatorHeaders;
    use crate::store::memory::{MemoryProviderConfigStore, MemorySettingsStore};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn success_body(content: &str) -> serde_json::Value {
        serde_json::json!({ "choices": [{ "message": { "content": content } }] })
    }

    pub(crate) fn dispatcher_with(
        settings: Arc<MemorySettingsStore>,
        providers: Arc<MemoryProviderConfigStore>,
        defaults: StaticDefaults,
    ) -> AiDispatcher {
        let llm = LlmClient::new(
            Duration::from_secs(5),
            AggregatorHeaders {
                referer: "https://example.test".to_string(),
                title: "Interview Test".to_string(),
                hosts: vec!["openrouter.ai".to_string()],
            },
        )
        .unwrap();
        let resolver = ProviderConfigResolver::new(settings.clone(), providers.clone(), defaults);
        AiDispatcher::new(llm, resolver, providers, settings)
    }

    fn interview_config(server: &MockServer, keys: &[&str]) -> ProviderConfig {
        let mut config = provider(7, ProviderType::Interview, keys, true);
        config.api_url = format!("{}/chat/completions", server.uri());
        config
    }

    #[tokio::test]
    async fn test_rate_limit_rotates_once_and_retries_with_next_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer key1"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer key2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("Success Response")))
            .expect(1)
            .mount(&server)
            .await;

        let settings = Arc::new(MemorySettingsStore::external_enabled());
        let providers = Arc::new(MemoryProviderConfigStore::with_configs(vec![
            interview_config(&server, &["key1", "key2"]),
        ]));
        let dispatcher = dispatcher_with(settings.clone(), providers.clone(), test_defaults());

        let reply = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap();

        assert_eq!(reply, "Success Response");
        assert_eq!(providers.save_count(), 1);
        assert_eq!(providers.get(7).unwrap().current_key_index, 1);
        assert_eq!(settings.usage_records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_also_triggers_rotation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let providers = Arc::new(MemoryProviderConfigStore::with_configs(vec![
            interview_config(&server, &["bad", "good"]),
        ]));
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_enabled()),
            providers.clone(),
            test_defaults(),
        );

        let reply = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_second_failure_is_not_retried_again() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let providers = Arc::new(MemoryProviderConfigStore::with_configs(vec![
            interview_config(&server, &["a", "b", "c"]),
        ]));
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_enabled()),
            providers.clone(),
            test_defaults(),
        );

        let err = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::RateLimited));
        assert_eq!(providers.save_count(), 1);
        assert_eq!(providers.get(7).unwrap().current_key_index, 1);
    }

    #[tokio::test]
    async fn test_single_key_config_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let providers = Arc::new(MemoryProviderConfigStore::with_configs(vec![
            interview_config(&server, &["only"]),
        ]));
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_enabled()),
            providers.clone(),
            test_defaults(),
        );

        let err = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap_err();
        assert!(err.is_rotatable());
        assert_eq!(providers.save_count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_is_not_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let providers = Arc::new(MemoryProviderConfigStore::with_configs(vec![
            interview_config(&server, &["a", "b"]),
        ]));
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_enabled()),
            providers.clone(),
            test_defaults(),
        );

        let err = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 500 }));
        assert_eq!(providers.save_count(), 0);
    }

    #[tokio::test]
    async fn test_static_default_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let mut defaults = test_defaults();
        defaults.chat.url = format!("{}/chat/completions", server.uri());
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_disabled()),
            Arc::new(MemoryProviderConfigStore::default()),
            defaults,
        );

        let err = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::RateLimited));
    }

    #[tokio::test]
    async fn test_lost_rotation_race_still_retries_with_stored_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("late ok")))
            .expect(1)
            .with_priority(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer key1"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .with_priority(1)
            .mount(&server)
            .await;

        let providers = Arc::new(MemoryProviderConfigStore::with_configs(vec![
            interview_config(&server, &["key1", "key2"]),
        ]));
        *providers.fail_next_save.lock().unwrap() = true;
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_enabled()),
            providers.clone(),
            test_defaults(),
        );

        let reply = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap();
        assert_eq!(reply, "late ok");
        assert_eq!(providers.save_count(), 0);
        let stored = providers.get(7).unwrap();
        assert_eq!(stored.current_key_index, 0);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_placeholder_key_never_calls_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("nope")))
            .expect(0)
            .mount(&server)
            .await;

        let mut defaults = test_defaults();
        defaults.chat.url = format!("{}/chat/completions", server.uri());
        defaults.chat.key = "your-api-key".to_string();
        let dispatcher = dispatcher_with(
            Arc::new(MemorySettingsStore::external_disabled()),
            Arc::new(MemoryProviderConfigStore::default()),
            defaults,
        );

        let err = dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::ConfigurationMissing));
    }

    #[tokio::test]
    async fn test_static_default_calls_do_not_record_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("hello")))
            .mount(&server)
            .await;

        let mut defaults = test_defaults();
        defaults.chat.url = format!("{}/chat/completions", server.uri());
        let settings = Arc::new(MemorySettingsStore::external_disabled());
        let dispatcher = dispatcher_with(
            settings.clone(),
            Arc::new(MemoryProviderConfigStore::default()),
            defaults,
        );

        dispatcher
            .complete(ProviderType::Interview, &[ChatMessage::user("Hi")])
            .await
            .unwrap();
        assert!(settings.usage_records.lock().unwrap().is_empty());
    }
}
