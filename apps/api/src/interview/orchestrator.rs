//! Conversation orchestration: decides what the interviewer says next.
//!
//! No turn state is stored. Every call folds the immutable history:
//! the first interviewer turn is the introduction, so the scripted question
//! due now is `fixed_questions[interviewer_turns - 1]`. Once the script is
//! exhausted the interview ends; freeform interviews end at a fixed history cap.
//!
//! Flow: resolve question bank → plan turn → build prompt → dispatch →
//!       ensure scripted question → `{response, shouldEnd}`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::interview::prompts::{build_prompt, CLOSING_RULE};
use crate::llm_client::dispatch::AiDispatcher;
use crate::llm_client::prompts::INVALID_TURN_MESSAGE;
use crate::llm_client::ChatMessage;
use crate::models::interview::{
    ConversationTurn, InterviewProfile, InterviewReply, InterviewRequest, Speaker,
};
use crate::models::provider::ProviderType;
use crate::store::QuestionBankStore;

/// Freeform interviews end once the history holds this many turns (~8 exchanges).
pub const FREEFORM_TURN_CAP: usize = 16;

pub const INVALID_INPUT_CODE: &str = "INVALID_INPUT";

/// What this turn should do, derived from (script, history) alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    pub next_question: Option<String>,
    pub should_end: bool,
}

pub fn interviewer_turn_count(history: &[ConversationTurn]) -> usize {
    history
        .iter()
        .filter(|t| t.role == Speaker::Interviewer)
        .count()
}

pub fn plan_turn(fixed_questions: &[String], history: &[ConversationTurn]) -> TurnPlan {
    if fixed_questions.is_empty() {
        return TurnPlan {
            next_question: None,
            should_end: history.len() >= FREEFORM_TURN_CAP,
        };
    }

    // The first interviewer turn is the introduction and consumes no question.
    let next_question = interviewer_turn_count(history)
        .checked_sub(1)
        .and_then(|index| fixed_questions.get(index))
        .cloned();

    TurnPlan {
        should_end: next_question.is_none(),
        next_question,
    }
}

/// `[system] + history (candidate→user, interviewer→assistant) + current answer`.
pub fn build_messages(
    system_prompt: String,
    history: &[ConversationTurn],
    current_response: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: turn.role.chat_role().to_string(),
        content: turn.content.clone(),
    }));
    if let Some(answer) = current_response.map(str::trim).filter(|a| !a.is_empty()) {
        messages.push(ChatMessage::user(answer));
    }
    messages
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Makes sure a due scripted question reaches the candidate verbatim.
/// Replies that already contain it are returned untouched.
pub fn ensure_scripted_question(reply: &str, question: &str) -> String {
    let reply = reply.trim();
    if reply.is_empty() {
        return question.to_string();
    }
    if normalize(reply).contains(&normalize(question)) {
        return reply.to_string();
    }
    format!("{reply}\n\n{question}")
}

#[derive(Clone)]
pub struct InterviewOrchestrator {
    dispatcher: AiDispatcher,
    question_banks: Arc<dyn QuestionBankStore>,
}

impl InterviewOrchestrator {
    pub fn new(dispatcher: AiDispatcher, question_banks: Arc<dyn QuestionBankStore>) -> Self {
        Self {
            dispatcher,
            question_banks,
        }
    }

    /// Inline questions win; otherwise the referenced bank is loaded once.
    /// A missing or unreadable bank means a freeform interview.
    pub async fn resolve_fixed_questions(&self, profile: &InterviewProfile) -> Vec<String> {
        if !profile.fixed_questions.is_empty() {
            return profile.fixed_questions.clone();
        }
        let Some(bank_id) = profile.question_bank_id else {
            return Vec::new();
        };

        match self.question_banks.get_questions(bank_id).await {
            Ok(Some(questions)) => {
                info!("Loaded {} questions from bank {bank_id}", questions.len());
                questions.into_iter().map(|q| q.question).collect()
            }
            Ok(None) => {
                warn!("Question bank {bank_id} not found, continuing freeform");
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to load question bank {bank_id}, continuing freeform: {e:#}");
                Vec::new()
            }
        }
    }

    /// Produces the interviewer's next message. Never fails: invalid input and
    /// upstream failures both come back as canned reply text.
    pub async fn respond(&self, mut request: InterviewRequest) -> InterviewReply {
        if let Err(reason) = request.validate() {
            warn!("Rejected interview turn: {reason}");
            return invalid_turn_reply();
        }

        let fixed_questions = self.resolve_fixed_questions(&request.profile).await;
        request.profile.fixed_questions = fixed_questions;

        let history = &request.conversation_history;
        let plan = plan_turn(&request.profile.fixed_questions, history);
        debug!(
            "Interview turn: interviewer_turns={}, history_len={}, scripted={}, should_end={}",
            interviewer_turn_count(history),
            history.len(),
            plan.next_question.is_some(),
            plan.should_end
        );

        let mut system_prompt = build_prompt(&request.profile, plan.next_question.as_deref());
        if plan.should_end {
            system_prompt.push_str(CLOSING_RULE);
        }
        let messages = build_messages(
            system_prompt,
            history,
            request.current_response.as_deref(),
        );

        let response = match self
            .dispatcher
            .complete(ProviderType::Interview, &messages)
            .await
        {
            Ok(reply) => match plan.next_question.as_deref() {
                Some(question) => ensure_scripted_question(&reply, question),
                None => reply,
            },
            Err(e) => e.user_message().to_string(),
        };

        InterviewReply {
            response,
            should_end: plan.should_end,
            error: None,
        }
    }
}

pub fn invalid_turn_reply() -> InterviewReply {
    InterviewReply {
        response: INVALID_TURN_MESSAGE.to_string(),
        should_end: false,
        error: Some(INVALID_INPUT_CODE.to_string()),
    }
}
