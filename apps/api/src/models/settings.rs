use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_DAILY_TOKEN_BUDGET: i64 = 100_000;
pub const DEFAULT_MONTHLY_TOKEN_BUDGET: i64 = 3_000_000;
pub const DEFAULT_MAX_TOKENS_PER_REQUEST: i32 = 1000;
pub const DEFAULT_INTELLIGENCE_API_URL: &str = "http://localhost:8000";

/// Process-wide AI settings: the external-AI master switch plus token budgets.
///
/// Created lazily on first read with external AI disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAiSettings {
    pub enable_external_ai: bool,
    pub preferred_provider: String,
    pub enable_adaptive_difficulty: bool,
    pub enable_ai_enhanced_feedback: bool,
    pub max_tokens_per_request: i32,
    pub daily_token_budget: i64,
    pub monthly_token_budget: i64,
    pub intelligence_api_url: String,
    pub tokens_used_today: i64,
    pub tokens_used_this_month: i64,
    pub last_reset_date: DateTime<Utc>,
}

impl GlobalAiSettings {
    pub fn with_defaults(now: DateTime<Utc>) -> Self {
        Self {
            enable_external_ai: false,
            preferred_provider: "groq".to_string(),
            enable_adaptive_difficulty: true,
            enable_ai_enhanced_feedback: false,
            max_tokens_per_request: DEFAULT_MAX_TOKENS_PER_REQUEST,
            daily_token_budget: DEFAULT_DAILY_TOKEN_BUDGET,
            monthly_token_budget: DEFAULT_MONTHLY_TOKEN_BUDGET,
            intelligence_api_url: DEFAULT_INTELLIGENCE_API_URL.to_string(),
            tokens_used_today: 0,
            tokens_used_this_month: 0,
            last_reset_date: now,
        }
    }

    /// External providers may be used only while switched on and under both budgets.
    pub fn can_use_external_ai(&self) -> bool {
        self.enable_external_ai
            && self.tokens_used_today < self.daily_token_budget
            && self.tokens_used_this_month < self.monthly_token_budget
    }

    /// True when `now` falls in a later UTC day or month than the last reset.
    pub fn needs_roll_over(&self, now: DateTime<Utc>) -> bool {
        let (new_day, new_month) = self.periods_elapsed(now);
        new_day || new_month
    }

    fn periods_elapsed(&self, now: DateTime<Utc>) -> (bool, bool) {
        let last = self.last_reset_date;
        let new_day = now.date_naive() > last.date_naive();
        let new_month = (now.year(), now.month()) > (last.year(), last.month());
        (new_day, new_month)
    }

    /// Resets counters whose UTC calendar day / month has passed.
    /// Returns true when anything changed and the record needs saving.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let (new_day, new_month) = self.periods_elapsed(now);

        if new_day {
            self.tokens_used_today = 0;
        }
        if new_month {
            self.tokens_used_this_month = 0;
        }
        if new_day || new_month {
            self.last_reset_date = now;
            return true;
        }
        false
    }

    pub fn record_usage(&mut self, tokens: i64) {
        let tokens = tokens.max(0);
        self.tokens_used_today = self.tokens_used_today.saturating_add(tokens);
        self.tokens_used_this_month = self.tokens_used_this_month.saturating_add(tokens);
    }

    pub fn reset_usage(&mut self, now: DateTime<Utc>) {
        self.tokens_used_today = 0;
        self.tokens_used_this_month = 0;
        self.last_reset_date = now;
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.enable_external_ai {
            tracing::info!("External AI setting changed to: {v}");
            self.enable_external_ai = v;
        }
        if let Some(v) = patch.preferred_provider {
            self.preferred_provider = v;
        }
        if let Some(v) = patch.enable_adaptive_difficulty {
            self.enable_adaptive_difficulty = v;
        }
        if let Some(v) = patch.enable_ai_enhanced_feedback {
            self.enable_ai_enhanced_feedback = v;
        }
        if let Some(v) = patch.max_tokens_per_request {
            self.max_tokens_per_request = v;
        }
        if let Some(v) = patch.daily_token_budget {
            self.daily_token_budget = v;
        }
        if let Some(v) = patch.monthly_token_budget {
            self.monthly_token_budget = v;
        }
        if let Some(v) = patch.intelligence_api_url {
            self.intelligence_api_url = v;
        }
    }
}

/// Partial admin update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub enable_external_ai: Option<bool>,
    pub preferred_provider: Option<String>,
    pub enable_adaptive_difficulty: Option<bool>,
    pub enable_ai_enhanced_feedback: Option<bool>,
    pub max_tokens_per_request: Option<i32>,
    pub daily_token_budget: Option<i64>,
    pub monthly_token_budget: Option<i64>,
    pub intelligence_api_url: Option<String>,
}

impl SettingsPatch {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens_per_request.is_some_and(|v| v <= 0) {
            return Err("maxTokensPerRequest must be positive".to_string());
        }
        if self.daily_token_budget.is_some_and(|v| v < 0)
            || self.monthly_token_budget.is_some_and(|v| v < 0)
        {
            return Err("token budgets cannot be negative".to_string());
        }
        Ok(())
    }
}
