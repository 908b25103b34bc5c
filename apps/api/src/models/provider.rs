use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which concern a provider config serves. Resolution looks up the active
/// config of the requested type before falling back to any active config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    Interview,
    Tts,
    #[default]
    General,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Interview => "INTERVIEW",
            ProviderType::Tts => "TTS",
            ProviderType::General => "GENERAL",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INTERVIEW" => Ok(ProviderType::Interview),
            "TTS" => Ok(ProviderType::Tts),
            "GENERAL" => Ok(ProviderType::General),
            other => Err(format!("unknown provider type '{other}'")),
        }
    }
}

/// An upstream provider with an ordered list of API keys.
///
/// `version` is bumped on every successful save; writers compare-and-set on it
/// so concurrent key rotations from parallel sessions are detected instead of
/// silently overwriting each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: i64,
    pub provider_name: String,
    pub api_url: String,
    pub model_name: String,
    pub api_keys: Vec<String>,
    pub current_key_index: i32,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub active: bool,
    pub version: i64,
}

impl ProviderConfig {
    /// The key at `current_key_index`, wrapped into range. `None` when no keys exist.
    pub fn current_key(&self) -> Option<&str> {
        if self.api_keys.is_empty() {
            return None;
        }
        let index = self.normalized_index(self.current_key_index);
        self.api_keys.get(index).map(String::as_str)
    }

    /// A copy advanced to the next key, or `None` when there is nothing to rotate to.
    pub fn rotated(&self) -> Option<ProviderConfig> {
        if self.api_keys.len() < 2 {
            return None;
        }
        let next = (self.normalized_index(self.current_key_index) + 1) % self.api_keys.len();
        Some(ProviderConfig {
            current_key_index: next as i32,
            ..self.clone()
        })
    }

    pub fn can_rotate(&self) -> bool {
        self.api_keys.len() > 1
    }

    fn normalized_index(&self, index: i32) -> usize {
        (index.max(0) as usize) % self.api_keys.len()
    }
}

/// Raw database row. `provider_type` is stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderConfigRow {
    pub id: i64,
    pub provider_name: String,
    pub api_url: String,
    pub model_name: String,
    pub api_keys: Vec<String>,
    pub current_key_index: i32,
    pub provider_type: String,
    pub active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProviderConfigRow> for ProviderConfig {
    fn from(row: ProviderConfigRow) -> Self {
        let provider_type = row.provider_type.parse().unwrap_or_else(|e| {
            tracing::warn!("Provider config {} has {e}; treating as GENERAL", row.id);
            ProviderType::General
        });
        ProviderConfig {
            id: row.id,
            provider_name: row.provider_name,
            api_url: row.api_url,
            model_name: row.model_name,
            api_keys: row.api_keys,
            current_key_index: row.current_key_index,
            provider_type,
            active: row.active,
            version: row.version,
        }
    }
}

/// Admin payload for creating a provider config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProviderConfig {
    pub provider_name: String,
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(rename = "type", default)]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub active: bool,
}
