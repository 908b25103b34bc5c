//! Operator surface for provider configs and the global AI settings.
//!
//! Every route requires `Authorization: Bearer <ADMIN_TOKEN>`. With no token
//! configured the whole surface answers 403.

pub mod handlers;

use axum::http::{header, HeaderMap};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        warn!("Admin request rejected: ADMIN_TOKEN is not configured");
        return Err(AppError::Forbidden);
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AppError::Unauthorized)?;

    if presented != expected {
        warn!("Admin request rejected: invalid token");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Keys pasted into the admin UI often arrive JSON-quoted.
pub fn clean_api_key(raw: &str) -> Option<String> {
    let key = raw.replace('"', "");
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}
