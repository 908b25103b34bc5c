pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::admin::handlers as admin;
use crate::interview::handlers as interview;
use crate::speech;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interview API
        .route("/api/ai/interview", post(interview::handle_interview_turn))
        .route(
            "/api/ai/interview/feedback",
            post(interview::handle_interview_feedback),
        )
        .route("/api/ai/tts", post(speech::handle_tts))
        // Admin: provider configs
        .route(
            "/api/admin/ai-config",
            get(admin::handle_list_configs).post(admin::handle_create_config),
        )
        .route("/api/admin/ai-config/:id", delete(admin::handle_delete_config))
        .route("/api/admin/ai-config/:id/keys", post(admin::handle_add_key))
        .route(
            "/api/admin/ai-config/:id/activate",
            post(admin::handle_activate_config),
        )
        .route(
            "/api/admin/ai-config/:id/select-key/:index",
            post(admin::handle_select_key),
        )
        // Admin: global settings
        .route(
            "/api/admin/ai-settings",
            get(admin::handle_get_settings).put(admin::handle_update_settings),
        )
        .route(
            "/api/admin/ai-settings/toggle",
            post(admin::handle_toggle_external_ai),
        )
        .route(
            "/api/admin/ai-settings/reset-usage",
            post(admin::handle_reset_usage),
        )
        .with_state(state)
}
