//! In-memory stores for tests. Writes are counted so tests can assert on
//! persistence side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::provider::{NewProviderConfig, ProviderConfig, ProviderType};
use crate::models::question_bank::BankQuestion;
use crate::models::settings::{GlobalAiSettings, SettingsPatch};
use crate::store::{ProviderConfigStore, QuestionBankStore, SettingsStore, StoreError};

pub struct MemorySettingsStore {
    settings: Mutex<GlobalAiSettings>,
    pub usage_records: Mutex<Vec<i64>>,
}

impl MemorySettingsStore {
    pub fn new(settings: GlobalAiSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            usage_records: Mutex::new(Vec::new()),
        }
    }

    pub fn external_enabled() -> Self {
        let mut settings = GlobalAiSettings::with_defaults(Utc::now());
        settings.enable_external_ai = true;
        Self::new(settings)
    }

    pub fn external_disabled() -> Self {
        Self::new(GlobalAiSettings::with_defaults(Utc::now()))
    }

    pub fn snapshot(&self) -> GlobalAiSettings {
        self.settings.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn read(&self) -> Result<GlobalAiSettings> {
        let mut settings = self.settings.lock().unwrap();
        settings.roll_over(Utc::now());
        Ok(settings.clone())
    }

    async fn record_token_usage(&self, tokens: i64) -> Result<()> {
        self.settings.lock().unwrap().record_usage(tokens);
        self.usage_records.lock().unwrap().push(tokens);
        Ok(())
    }

    async fn update(&self, patch: SettingsPatch) -> Result<GlobalAiSettings> {
        let mut settings = self.settings.lock().unwrap();
        settings.apply(patch);
        Ok(settings.clone())
    }

    async fn toggle_external_ai(&self) -> Result<GlobalAiSettings> {
        let mut settings = self.settings.lock().unwrap();
        settings.enable_external_ai = !settings.enable_external_ai;
        Ok(settings.clone())
    }

    async fn reset_usage(&self) -> Result<GlobalAiSettings> {
        let mut settings = self.settings.lock().unwrap();
        settings.reset_usage(Utc::now());
        Ok(settings.clone())
    }
}

/// Settings store whose backing database is unreachable.
pub struct UnavailableSettingsStore;

#[async_trait]
impl SettingsStore for UnavailableSettingsStore {
    async fn read(&self) -> Result<GlobalAiSettings> {
        bail!("settings database unavailable")
    }

    async fn record_token_usage(&self, _tokens: i64) -> Result<()> {
        bail!("settings database unavailable")
    }

    async fn update(&self, _patch: SettingsPatch) -> Result<GlobalAiSettings> {
        bail!("settings database unavailable")
    }

    async fn toggle_external_ai(&self) -> Result<GlobalAiSettings> {
        bail!("settings database unavailable")
    }

    async fn reset_usage(&self) -> Result<GlobalAiSettings> {
        bail!("settings database unavailable")
    }
}

#[derive(Default)]
pub struct MemoryProviderConfigStore {
    configs: Mutex<Vec<ProviderConfig>>,
    saves: AtomicUsize,
    /// When set, the next `save` behaves as if another writer got there first.
    pub fail_next_save: Mutex<bool>,
}

impl MemoryProviderConfigStore {
    pub fn with_configs(configs: Vec<ProviderConfig>) -> Self {
        Self {
            configs: Mutex::new(configs),
            ..Default::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: i64) -> Option<ProviderConfig> {
        self.configs.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl ProviderConfigStore for MemoryProviderConfigStore {
    async fn find_active_by_type(
        &self,
        provider_type: ProviderType,
    ) -> Result<Option<ProviderConfig>> {
        Ok(self
            .configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.active && c.provider_type == provider_type)
            .cloned())
    }

    async fn find_any_active(&self) -> Result<Option<ProviderConfig>> {
        Ok(self.configs.lock().unwrap().iter().find(|c| c.active).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProviderConfig>> {
        Ok(self.get(id))
    }

    async fn list(&self) -> Result<Vec<ProviderConfig>> {
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn insert(&self, config: NewProviderConfig) -> Result<ProviderConfig> {
        let mut configs = self.configs.lock().unwrap();
        if configs
            .iter()
            .any(|c| c.provider_name.eq_ignore_ascii_case(&config.provider_name))
        {
            return Err(StoreError::DuplicateProviderName(config.provider_name).into());
        }
        let id = configs.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let stored = ProviderConfig {
            id,
            provider_name: config.provider_name,
            api_url: config.api_url,
            model_name: config.model_name,
            api_keys: config.api_keys,
            current_key_index: 0,
            provider_type: config.provider_type,
            active: config.active,
            version: 0,
        };
        configs.push(stored.clone());
        Ok(stored)
    }

    async fn save(&self, config: &ProviderConfig) -> Result<Option<ProviderConfig>> {
        let mut configs = self.configs.lock().unwrap();
        let Some(existing) = configs.iter_mut().find(|c| c.id == config.id) else {
            return Ok(None);
        };

        let mut fail = self.fail_next_save.lock().unwrap();
        if *fail {
            *fail = false;
            existing.version += 1;
            return Ok(None);
        }
        if existing.version != config.version {
            return Ok(None);
        }

        *existing = ProviderConfig {
            version: config.version + 1,
            ..config.clone()
        };
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(Some(existing.clone()))
    }

    async fn activate(&self, id: i64) -> Result<Option<ProviderConfig>> {
        let mut configs = self.configs.lock().unwrap();
        let Some(target_type) = configs.iter().find(|c| c.id == id).map(|c| c.provider_type) else {
            return Ok(None);
        };
        for config in configs.iter_mut().filter(|c| c.provider_type == target_type) {
            config.active = config.id == id;
            config.version += 1;
        }
        Ok(configs.iter().find(|c| c.id == id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut configs = self.configs.lock().unwrap();
        let before = configs.len();
        configs.retain(|c| c.id != id);
        Ok(configs.len() != before)
    }
}

#[derive(Default)]
pub struct MemoryQuestionBankStore {
    banks: HashMap<Uuid, Vec<BankQuestion>>,
    pub lookups: AtomicUsize,
}

impl MemoryQuestionBankStore {
    pub fn with_bank(id: Uuid, questions: &[&str]) -> Self {
        let mut banks = HashMap::new();
        banks.insert(
            id,
            questions
                .iter()
                .map(|q| BankQuestion {
                    question: q.to_string(),
                    answer: None,
                    difficulty: None,
                    tags: Vec::new(),
                })
                .collect(),
        );
        Self {
            banks,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuestionBankStore for MemoryQuestionBankStore {
    async fn get_questions(&self, bank_id: Uuid) -> Result<Option<Vec<BankQuestion>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.banks.get(&bank_id).cloned())
    }
}
