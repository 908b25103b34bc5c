use axum::{body::Bytes, extract::State, Json};
use tracing::warn;

use crate::interview::orchestrator::invalid_turn_reply;
use crate::llm_client::prompts::INVALID_TURN_MESSAGE;
use crate::models::interview::{FeedbackReply, FeedbackRequest, InterviewReply, InterviewRequest};
use crate::state::AppState;

// Bodies are decoded by hand: a malformed turn answers with a turn-level
// error instead of an extractor rejection, so the session keeps going.

/// POST /api/ai/interview
pub async fn handle_interview_turn(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<InterviewReply> {
    let request: InterviewRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed interview request: {e}");
            return Json(invalid_turn_reply());
        }
    };
    Json(state.interviews.respond(request).await)
}

/// POST /api/ai/interview/feedback
pub async fn handle_interview_feedback(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<FeedbackReply> {
    let request: FeedbackRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed feedback request: {e}");
            return Json(FeedbackReply {
                summary: INVALID_TURN_MESSAGE.to_string(),
            });
        }
    };
    Json(state.feedback.generate(&request).await)
}
