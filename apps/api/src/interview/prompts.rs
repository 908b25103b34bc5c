// Prompt text for the interview and feedback calls.
// Builders here are pure: same arguments, byte-identical output.

use crate::models::interview::{Accent, ConversationTurn, InterviewMeta, InterviewProfile};

pub const FEEDBACK_SYSTEM: &str =
    "You are an expert technical interviewer providing detailed feedback.";

/// Appended to the system prompt on the final turn.
pub const CLOSING_RULE: &str = "\nClosing:\n\
    - This is the final turn of the interview. Acknowledge the candidate's last answer, \
    thank them for their time and let them know the interview is complete.\n\
    - Do NOT ask any further questions.\n";

const FEEDBACK_RUBRIC: &str = "\nProvide feedback in this format:\n\n\
    **Technical Score:** X/10\n\
    **Communication Score:** X/10\n\
    **Problem Solving Score:** X/10\n\n\
    **Strengths:**\n- [List 2-3 strengths]\n\n\
    **Weaknesses:**\n- [List 2-3 areas for improvement]\n\n\
    **Final Verdict:** [Selected/Borderline/Rejected]\n\n\
    **Improvement Suggestions:**\n- [List 2-3 specific suggestions]\n\n\
    Be honest but constructive. Focus on specific examples from the interview.";

fn or_unspecified(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "Not specified"
    } else {
        value
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn persona_rules(accent: Accent) -> &'static str {
    match accent {
        Accent::Us => "- Use American English. Tone: Direct, friendly, confident.\n",
        Accent::Uk => {
            "- Use British English idioms and spelling. Tone: Polished, professional, slightly formal.\n"
        }
        Accent::In => {
            "- You are a Calm Indian Technical Interviewer.\n\
             - Use clear, professional Indian English.\n\
             - Tone: Very calm, respectful, patient, and encouraging (use words like 'Good', 'Okay', 'Right').\n\
             - Speak at a moderate, steady pace.\n"
        }
        Accent::Au => {
            "- Use Australian English. Tone: Friendly, laid-back but professional. \
             Use 'mate' occasionally if rapport is built.\n"
        }
    }
}

/// System prompt for one interviewer turn.
///
/// `next_question` is the scripted question due this turn, if any; the model
/// is told to ask it verbatim and nothing else.
pub fn build_prompt(profile: &InterviewProfile, next_question: Option<&str>) -> String {
    let mut prompt = format!(
        "You are a professional technical interviewer conducting a {} for a {} position.\n\
         Candidate Profile: Experience: {}, Skills: {}\n",
        profile.interview_type.label(),
        profile.role.trim(),
        or_unspecified(&profile.experience),
        or_unspecified(&profile.skills)
    );

    if let Some(resume) = non_blank(&profile.resume_context) {
        prompt.push_str("\nRESUME CONTEXT FROM CANDIDATE:\n");
        prompt.push_str(resume);
        prompt.push_str(
            "\nINSTRUCTION: Use the above resume context to contextualize your questions. \
             Ask about their specific projects and experience mentioned in the resume.\n",
        );
    }

    if let Some(focus) = non_blank(&profile.custom_questions) {
        prompt.push_str(&format!("Focus: {focus}\n"));
    }

    prompt.push_str("\nYour Persona:\n");
    prompt.push_str(persona_rules(profile.interviewer_accent));

    prompt.push_str("\nInteraction Rules:\n");
    prompt.push_str(
        "1. **CRITICAL:** Start by briefly evaluating/acknowledging the candidate's PREVIOUS \
         answer (e.g., 'That's a great point', 'I see').\n",
    );
    prompt.push_str(
        "2. **ONE QUESTION RULE:** Ask EXACTLY ONE question per turn. NEVER ask multiple \
         questions in one turn.\n",
    );

    match next_question {
        Some(question) => {
            prompt.push_str("3. **STRICT SCRIPT MODE:**\n");
            prompt.push_str("   - You MUST ask the following question EXACTLY, word for word:\n");
            prompt.push_str(&format!("     \"{question}\"\n"));
            prompt.push_str(
                "   - Acknowledge the previous answer briefly, then ask ONLY the question above.\n",
            );
            prompt.push_str("   - Do NOT ask any other follow-up or extra questions.\n");
        }
        None => {
            prompt.push_str(
                "3. **Flow:** If an answer needs clarification, ask ONE follow-up question. \
                 Otherwise move on smoothly with a transition phrase. Adapt difficulty to the \
                 candidate's answers.\n",
            );
        }
    }

    prompt.push_str(
        "4. **Length:** Keep your responses CONVERSATIONAL and BRIEF (2-4 sentences).\n",
    );
    prompt.push_str(
        "5. **Tone:** Be human, warm, encouraging, and professional. Avoid robotic repetition.\n",
    );

    prompt
}

/// Transcript-analysis prompt with the fixed scoring rubric.
pub fn build_feedback_prompt(
    profile: &InterviewProfile,
    history: &[ConversationTurn],
    meta: Option<&InterviewMeta>,
) -> String {
    let candidate = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Candidate");
    let mut prompt = format!(
        "Analyze this interview and provide detailed feedback.\n\n\
         Candidate: {candidate}\n\
         Role: {}\n\
         Interview Type: {}\n\
         Experience: {}\n",
        profile.role.trim(),
        profile.interview_type.label(),
        or_unspecified(&profile.experience)
    );

    if let Some(meta) = meta {
        if let Some(minutes) = meta.duration_minutes {
            prompt.push_str(&format!("Duration: {minutes} minutes\n"));
        }
        if let Some(answered) = meta.questions_answered {
            prompt.push_str(&format!("Questions Answered: {answered}\n"));
        }
        if meta.ended_early == Some(true) {
            prompt.push_str("Note: The candidate ended the interview early.\n");
        }
    }

    prompt.push_str("\nInterview Transcript:\n");
    if history.is_empty() {
        prompt.push_str("(no conversation recorded)\n\n");
    }
    for turn in history {
        prompt.push_str(&format!(
            "{}: {}\n\n",
            turn.role.transcript_label(),
            turn.content
        ));
    }

    prompt.push_str(FEEDBACK_RUBRIC);
    prompt
}
