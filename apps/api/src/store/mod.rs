//! Persistence seams for the configuration records and question banks.
//!
//! `AppState` carries each store as `Arc<dyn …>`: Postgres in production,
//! the in-memory doubles in tests.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::provider::{NewProviderConfig, ProviderConfig, ProviderType};
use crate::models::question_bank::BankQuestion;
use crate::models::settings::{GlobalAiSettings, SettingsPatch};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// Store failures callers are expected to branch on. Carried inside
/// `anyhow::Error` and recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Provider '{0}' already exists")]
    DuplicateProviderName(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the singleton settings, creating defaults on first read and
    /// rolling usage counters over to the current day/month.
    async fn read(&self) -> Result<GlobalAiSettings>;

    async fn record_token_usage(&self, tokens: i64) -> Result<()>;

    async fn update(&self, patch: SettingsPatch) -> Result<GlobalAiSettings>;

    async fn toggle_external_ai(&self) -> Result<GlobalAiSettings>;

    async fn reset_usage(&self) -> Result<GlobalAiSettings>;
}

#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    async fn find_active_by_type(&self, provider_type: ProviderType)
        -> Result<Option<ProviderConfig>>;

    async fn find_any_active(&self) -> Result<Option<ProviderConfig>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ProviderConfig>>;

    async fn list(&self) -> Result<Vec<ProviderConfig>>;

    /// Fails with `StoreError::DuplicateProviderName` when the name is taken,
    /// compared case-insensitively.
    async fn insert(&self, config: NewProviderConfig) -> Result<ProviderConfig>;

    /// Compare-and-set on `config.version`. Returns the stored record (with its
    /// version bumped) or `None` when another writer saved first.
    async fn save(&self, config: &ProviderConfig) -> Result<Option<ProviderConfig>>;

    /// Activates `id` and deactivates every other config of the same type.
    async fn activate(&self, id: i64) -> Result<Option<ProviderConfig>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait QuestionBankStore: Send + Sync {
    /// Ordered questions of the bank, or `None` when the bank does not exist.
    async fn get_questions(&self, bank_id: Uuid) -> Result<Option<Vec<BankQuestion>>>;
}
