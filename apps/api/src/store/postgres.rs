use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::provider::{NewProviderConfig, ProviderConfig, ProviderConfigRow, ProviderType};
use crate::models::question_bank::{BankQuestion, QuestionBankRow};
use crate::models::settings::{GlobalAiSettings, SettingsPatch};
use crate::store::{ProviderConfigStore, QuestionBankStore, SettingsStore, StoreError};

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

const PROVIDER_COLUMNS: &str = "id, provider_name, api_url, model_name, api_keys, \
    current_key_index, provider_type, active, version, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "enable_external_ai, preferred_provider, \
    enable_adaptive_difficulty, enable_ai_enhanced_feedback, max_tokens_per_request, \
    daily_token_budget, monthly_token_budget, intelligence_api_url, tokens_used_today, \
    tokens_used_this_month, last_reset_date";

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the singleton row under `FOR UPDATE`, inserting defaults if absent.
    async fn load_locked(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<GlobalAiSettings> {
        let inserted = sqlx::query("INSERT INTO ai_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(&mut **tx)
            .await?;
        if inserted.rows_affected() > 0 {
            info!("Created default AI settings (external AI disabled)");
        }

        let settings = sqlx::query_as::<_, GlobalAiSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM ai_settings WHERE id = 1 FOR UPDATE"
        ))
        .fetch_one(&mut **tx)
        .await?;
        Ok(settings)
    }

    async fn store(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        settings: &GlobalAiSettings,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ai_settings SET
                enable_external_ai = $1,
                preferred_provider = $2,
                enable_adaptive_difficulty = $3,
                enable_ai_enhanced_feedback = $4,
                max_tokens_per_request = $5,
                daily_token_budget = $6,
                monthly_token_budget = $7,
                intelligence_api_url = $8,
                tokens_used_today = $9,
                tokens_used_this_month = $10,
                last_reset_date = $11,
                updated_at = NOW()
            WHERE id = 1
            "#,
        )
        .bind(settings.enable_external_ai)
        .bind(&settings.preferred_provider)
        .bind(settings.enable_adaptive_difficulty)
        .bind(settings.enable_ai_enhanced_feedback)
        .bind(settings.max_tokens_per_request)
        .bind(settings.daily_token_budget)
        .bind(settings.monthly_token_budget)
        .bind(&settings.intelligence_api_url)
        .bind(settings.tokens_used_today)
        .bind(settings.tokens_used_this_month)
        .bind(settings.last_reset_date)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Runs `mutate` against the rolled-over singleton inside one transaction.
    async fn modify<F>(&self, mutate: F) -> Result<GlobalAiSettings>
    where
        F: FnOnce(&mut GlobalAiSettings) -> bool + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut settings = Self::load_locked(&mut tx).await?;
        let rolled = settings.roll_over(Utc::now());
        if rolled {
            info!("Reset AI token usage counters for new period");
        }
        let changed = mutate(&mut settings);
        if rolled || changed {
            Self::store(&mut tx, &settings).await?;
        }
        tx.commit().await?;
        Ok(settings)
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn read(&self) -> Result<GlobalAiSettings> {
        // Plain read on the hot path; only lock when the row is missing or stale.
        let current = sqlx::query_as::<_, GlobalAiSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM ai_settings WHERE id = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        match current {
            Some(settings) if !settings.needs_roll_over(Utc::now()) => Ok(settings),
            _ => self.modify(|_| false).await,
        }
    }

    async fn record_token_usage(&self, tokens: i64) -> Result<()> {
        let settings = self
            .modify(|s| {
                s.record_usage(tokens);
                true
            })
            .await?;
        info!(
            "Recorded {} tokens. Today: {}/{}, Month: {}/{}",
            tokens,
            settings.tokens_used_today,
            settings.daily_token_budget,
            settings.tokens_used_this_month,
            settings.monthly_token_budget
        );
        Ok(())
    }

    async fn update(&self, patch: SettingsPatch) -> Result<GlobalAiSettings> {
        self.modify(|s| {
            s.apply(patch);
            true
        })
        .await
    }

    async fn toggle_external_ai(&self) -> Result<GlobalAiSettings> {
        self.modify(|s| {
            info!(
                "Toggling external AI from {} to {}",
                s.enable_external_ai, !s.enable_external_ai
            );
            s.enable_external_ai = !s.enable_external_ai;
            true
        })
        .await
    }

    async fn reset_usage(&self) -> Result<GlobalAiSettings> {
        self.modify(|s| {
            s.reset_usage(Utc::now());
            true
        })
        .await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider configs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgProviderConfigStore {
    pool: PgPool,
}

impl PgProviderConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderConfigStore for PgProviderConfigStore {
    async fn find_active_by_type(
        &self,
        provider_type: ProviderType,
    ) -> Result<Option<ProviderConfig>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM ai_provider_configs \
             WHERE active AND provider_type = $1 ORDER BY updated_at DESC, id LIMIT 1"
        ))
        .bind(provider_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProviderConfig::from))
    }

    async fn find_any_active(&self) -> Result<Option<ProviderConfig>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM ai_provider_configs \
             WHERE active ORDER BY updated_at DESC, id LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProviderConfig::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProviderConfig>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM ai_provider_configs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProviderConfig::from))
    }

    async fn list(&self) -> Result<Vec<ProviderConfig>> {
        let rows = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM ai_provider_configs ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProviderConfig::from).collect())
    }

    async fn insert(&self, config: NewProviderConfig) -> Result<ProviderConfig> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            r#"
            INSERT INTO ai_provider_configs
                (provider_name, api_url, model_name, api_keys, provider_type, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PROVIDER_COLUMNS}
            "#
        ))
        .bind(&config.provider_name)
        .bind(&config.api_url)
        .bind(&config.model_name)
        .bind(&config.api_keys)
        .bind(config.provider_type.as_str())
        .bind(config.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
            );
            if duplicate {
                anyhow::Error::new(StoreError::DuplicateProviderName(config.provider_name.clone()))
            } else {
                anyhow::Error::new(e)
                    .context(format!("Failed to insert provider config '{}'", config.provider_name))
            }
        })?;
        Ok(row.into())
    }

    async fn save(&self, config: &ProviderConfig) -> Result<Option<ProviderConfig>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            r#"
            UPDATE ai_provider_configs SET
                provider_name = $1,
                api_url = $2,
                model_name = $3,
                api_keys = $4,
                current_key_index = $5,
                provider_type = $6,
                active = $7,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $8 AND version = $9
            RETURNING {PROVIDER_COLUMNS}
            "#
        ))
        .bind(&config.provider_name)
        .bind(&config.api_url)
        .bind(&config.model_name)
        .bind(&config.api_keys)
        .bind(config.current_key_index)
        .bind(config.provider_type.as_str())
        .bind(config.active)
        .bind(config.id)
        .bind(config.version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProviderConfig::from))
    }

    async fn activate(&self, id: i64) -> Result<Option<ProviderConfig>> {
        let mut tx = self.pool.begin().await?;

        let provider_type: Option<String> =
            sqlx::query_scalar("SELECT provider_type FROM ai_provider_configs WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(provider_type) = provider_type else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE ai_provider_configs
            SET active = (id = $1), version = version + 1, updated_at = NOW()
            WHERE provider_type = $2 AND (active OR id = $1)
            "#,
        )
        .bind(id)
        .bind(&provider_type)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM ai_provider_configs WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ai_provider_configs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Question banks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgQuestionBankStore {
    pool: PgPool,
}

impl PgQuestionBankStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionBankStore for PgQuestionBankStore {
    async fn get_questions(&self, bank_id: Uuid) -> Result<Option<Vec<BankQuestion>>> {
        let row = sqlx::query_as::<_, QuestionBankRow>(
            "SELECT id, name, questions FROM interview_question_banks WHERE id = $1",
        )
        .bind(bank_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let questions = row
            .parse_questions()
            .with_context(|| format!("Question bank '{}' ({}) has malformed questions", row.name, row.id))?;
        Ok(Some(questions))
    }
}
