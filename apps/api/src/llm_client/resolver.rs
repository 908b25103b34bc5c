//! Provider config resolution. Picks the `{url, key, model}` for one outbound call.
//!
//! Precedence, first match wins:
//! 1. global switch off or token budget exhausted → static default (no DB lookup)
//! 2. active config of the requested type with at least one key
//! 3. any active config with at least one key (legacy single-config deployments)
//! 4. static default
//!
//! Resolution never fails. Store errors are logged and the next tier is tried;
//! callers detect an unusable key with [`EffectiveConfig::has_usable_key`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::provider::{ProviderConfig, ProviderType};
use crate::store::{ProviderConfigStore, SettingsStore};

/// Keys shipped in sample configuration files. Never valid credentials.
pub const PLACEHOLDER_KEYS: &[&str] = &["your-api-key", "your-elevenlabs-key"];

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultProvider {
    pub url: String,
    pub key: String,
    pub model: String,
}

/// Deployment-baked fallbacks. TTS keeps the voice id in `model`.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDefaults {
    pub chat: DefaultProvider,
    pub tts: DefaultProvider,
}

impl StaticDefaults {
    pub fn for_type(&self, provider_type: ProviderType) -> &DefaultProvider {
        match provider_type {
            ProviderType::Tts => &self.tts,
            ProviderType::Interview | ProviderType::General => &self.chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    StaticDefault,
    TypedConfig,
    LegacyConfig,
}

/// The config actually used for one call. Never persisted; only the key index
/// of `backing` is written back when rotating.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub url: String,
    pub key: String,
    pub model: String,
    pub backing: Option<ProviderConfig>,
    pub source: ConfigSource,
}

impl EffectiveConfig {
    fn from_default(default: &DefaultProvider) -> Self {
        Self {
            url: default.url.clone(),
            key: default.key.clone(),
            model: default.model.clone(),
            backing: None,
            source: ConfigSource::StaticDefault,
        }
    }

    fn from_provider(config: ProviderConfig, source: ConfigSource) -> Option<Self> {
        let key = config.current_key()?.to_string();
        Some(Self {
            url: config.api_url.clone(),
            key,
            model: config.model_name.clone(),
            backing: Some(config),
            source,
        })
    }

    pub fn has_usable_key(&self) -> bool {
        let key = self.key.trim();
        !key.is_empty() && !PLACEHOLDER_KEYS.contains(&key)
    }

    pub fn provider_label(&self) -> &str {
        self.backing
            .as_ref()
            .map(|c| c.provider_name.as_str())
            .unwrap_or("static-default")
    }
}

#[derive(Clone)]
pub struct ProviderConfigResolver {
    settings: Arc<dyn SettingsStore>,
    providers: Arc<dyn ProviderConfigStore>,
    defaults: StaticDefaults,
}

impl ProviderConfigResolver {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        providers: Arc<dyn ProviderConfigStore>,
        defaults: StaticDefaults,
    ) -> Self {
        Self {
            settings,
            providers,
            defaults,
        }
    }

    pub fn static_default(&self, provider_type: ProviderType) -> EffectiveConfig {
        EffectiveConfig::from_default(self.defaults.for_type(provider_type))
    }

    pub async fn resolve(&self, provider_type: ProviderType) -> EffectiveConfig {
        let default = self.defaults.for_type(provider_type);

        let external_allowed = match self.settings.read().await {
            Ok(settings) => settings.can_use_external_ai(),
            Err(e) => {
                warn!("Failed to read AI settings, treating external AI as disabled: {e:#}");
                false
            }
        };
        if !external_allowed {
            info!("{provider_type} AI: external AI disabled or over budget, using static default");
            return EffectiveConfig::from_default(default);
        }

        match self.providers.find_active_by_type(provider_type).await {
            Ok(Some(config)) => {
                let name = config.provider_name.clone();
                if let Some(effective) =
                    EffectiveConfig::from_provider(config, ConfigSource::TypedConfig)
                {
                    info!("{provider_type} AI: using provider config '{name}'");
                    return effective;
                }
                warn!("{provider_type} AI: provider config '{name}' has no API keys, skipping");
            }
            Ok(None) => debug!("{provider_type} AI: no active typed provider config"),
            Err(e) => warn!("{provider_type} AI: typed provider lookup failed: {e:#}"),
        }

        match self.providers.find_any_active().await {
            Ok(Some(config)) => {
                let name = config.provider_name.clone();
                if let Some(effective) =
                    EffectiveConfig::from_provider(config, ConfigSource::LegacyConfig)
                {
                    info!("{provider_type} AI: using legacy active provider config '{name}'");
                    return effective;
                }
                warn!("{provider_type} AI: legacy provider config '{name}' has no API keys");
            }
            Ok(None) => debug!("{provider_type} AI: no active provider config at all"),
            Err(e) => warn!("{provider_type} AI: legacy provider lookup failed: {e:#}"),
        }

        info!("{provider_type} AI: using static default config");
        EffectiveConfig::from_default(default)
    }
}
