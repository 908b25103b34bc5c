use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::admin::{clean_api_key, require_admin};
use crate::errors::AppError;
use crate::models::provider::{NewProviderConfig, ProviderConfig};
use crate::models::settings::{GlobalAiSettings, SettingsPatch};
use crate::state::AppState;

async fn load_config(state: &AppState, id: i64) -> Result<ProviderConfig, AppError> {
    state
        .providers
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Provider config {id} not found")))
}

async fn persist(state: &AppState, config: &ProviderConfig) -> Result<ProviderConfig, AppError> {
    state.providers.save(config).await?.ok_or_else(|| {
        AppError::Conflict(format!(
            "Provider config {} was modified concurrently, reload and retry",
            config.id
        ))
    })
}

// ──────────────────────────────────────────────
// Provider configs
// ──────────────────────────────────────────────

/// GET /api/admin/ai-config
pub async fn handle_list_configs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProviderConfig>>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.providers.list().await?))
}

/// POST /api/admin/ai-config
pub async fn handle_create_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<NewProviderConfig>,
) -> Result<Json<ProviderConfig>, AppError> {
    require_admin(&state, &headers)?;

    if req.provider_name.trim().is_empty() || req.api_url.trim().is_empty() {
        return Err(AppError::Validation(
            "providerName and apiUrl are required".to_string(),
        ));
    }
    req.api_keys = req.api_keys.iter().filter_map(|k| clean_api_key(k)).collect();

    req.provider_name = req.provider_name.trim().to_string();

    // The very first config becomes the active one.
    if state.providers.list().await?.is_empty() {
        req.active = true;
    }

    let wants_active = req.active;
    // Name uniqueness is enforced by the store; a taken name surfaces as 409.
    let created = state.providers.insert(req).await?;
    info!(
        "Created provider config '{}' ({}) with {} keys",
        created.provider_name,
        created.provider_type,
        created.api_keys.len()
    );

    if !wants_active {
        return Ok(Json(created));
    }
    let activated = state
        .providers
        .activate(created.id)
        .await?
        .unwrap_or(created);
    Ok(Json(activated))
}

/// POST /api/admin/ai-config/:id/keys
///
/// Body is the raw key text; surrounding JSON quotes are stripped.
pub async fn handle_add_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: String,
) -> Result<Json<ProviderConfig>, AppError> {
    require_admin(&state, &headers)?;

    let key = clean_api_key(&body)
        .ok_or_else(|| AppError::Validation("API key must not be empty".to_string()))?;
    let mut config = load_config(&state, id).await?;
    config.api_keys.push(key);

    let saved = persist(&state, &config).await?;
    info!(
        "Added API key to '{}' ({} keys)",
        saved.provider_name,
        saved.api_keys.len()
    );
    Ok(Json(saved))
}

/// POST /api/admin/ai-config/:id/activate
pub async fn handle_activate_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    require_admin(&state, &headers)?;

    let activated = state
        .providers
        .activate(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Provider config {id} not found")))?;
    info!(
        "Activated provider config '{}' for type {}",
        activated.provider_name, activated.provider_type
    );
    Ok(Json(json!({
        "message": format!("Activated for type: {}", activated.provider_type),
        "config": activated,
    })))
}

/// POST /api/admin/ai-config/:id/select-key/:index
pub async fn handle_select_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, index)): Path<(i64, i32)>,
) -> Result<Json<ProviderConfig>, AppError> {
    require_admin(&state, &headers)?;

    let mut config = load_config(&state, id).await?;
    let in_range = usize::try_from(index).is_ok_and(|i| i < config.api_keys.len());
    if !in_range {
        return Err(AppError::Validation("Invalid key index".to_string()));
    }
    config.current_key_index = index;

    let saved = persist(&state, &config).await?;
    info!("Selected key index {index} for '{}'", saved.provider_name);
    Ok(Json(saved))
}

/// DELETE /api/admin/ai-config/:id
pub async fn handle_delete_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    require_admin(&state, &headers)?;

    if !state.providers.delete(id).await? {
        return Err(AppError::NotFound(format!("Provider config {id} not found")));
    }
    info!("Deleted provider config {id}");
    Ok(Json(json!({ "message": "Deleted" })))
}

// ──────────────────────────────────────────────
// Global settings
// ──────────────────────────────────────────────

/// GET /api/admin/ai-settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GlobalAiSettings>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.settings.read().await?))
}

/// PUT /api/admin/ai-settings
pub async fn handle_update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<GlobalAiSettings>, AppError> {
    require_admin(&state, &headers)?;
    patch.validate().map_err(AppError::Validation)?;
    Ok(Json(state.settings.update(patch).await?))
}

/// POST /api/admin/ai-settings/toggle
pub async fn handle_toggle_external_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GlobalAiSettings>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.settings.toggle_external_ai().await?))
}

/// POST /api/admin/ai-settings/reset-usage
pub async fn handle_reset_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GlobalAiSettings>, AppError> {
    require_admin(&state, &headers)?;
    let settings = state.settings.reset_usage().await?;
    info!("Token usage counters reset by admin");
    Ok(Json(settings))
}
