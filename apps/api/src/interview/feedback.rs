//! Post-interview feedback: one analysis call, raw text back.

use tracing::{info, warn};

use crate::interview::prompts::{build_feedback_prompt, FEEDBACK_SYSTEM};
use crate::llm_client::dispatch::AiDispatcher;
use crate::llm_client::prompts::INVALID_TURN_MESSAGE;
use crate::llm_client::ChatMessage;
use crate::models::interview::{FeedbackReply, FeedbackRequest};
use crate::models::provider::ProviderType;

#[derive(Clone)]
pub struct FeedbackGenerator {
    dispatcher: AiDispatcher,
}

impl FeedbackGenerator {
    pub fn new(dispatcher: AiDispatcher) -> Self {
        Self { dispatcher }
    }

    /// The model's formatting is not validated; whatever text comes back is the summary.
    pub async fn generate(&self, request: &FeedbackRequest) -> FeedbackReply {
        if let Err(reason) = request.profile.validate() {
            warn!("Rejected feedback request: {reason}");
            return FeedbackReply {
                summary: INVALID_TURN_MESSAGE.to_string(),
            };
        }

        let prompt = build_feedback_prompt(
            &request.profile,
            &request.conversation_history,
            request.interview_data.as_ref(),
        );
        let messages = [ChatMessage::system(FEEDBACK_SYSTEM), ChatMessage::user(prompt)];

        let summary = match self
            .dispatcher
            .complete(ProviderType::Interview, &messages)
            .await
        {
            Ok(text) => {
                info!(
                    "Generated feedback for {} ({} turns)",
                    request.profile.role.trim(),
                    request.conversation_history.len()
                );
                text
            }
            Err(e) => e.user_message().to_string(),
        };
        FeedbackReply { summary }
    }
}
