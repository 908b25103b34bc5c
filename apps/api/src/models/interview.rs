use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Interview round requested by the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    Hr,
    Technical,
    Coding,
    TechnicalCoding,
    Mixed,
}

impl InterviewType {
    /// Human label used when framing the system prompt.
    pub fn label(&self) -> &'static str {
        match self {
            InterviewType::Hr => "HR/Behavioral interview",
            InterviewType::Technical => "Technical interview",
            InterviewType::Coding => "Coding interview",
            InterviewType::TechnicalCoding => "Technical + Coding interview",
            InterviewType::Mixed => "Mixed Round",
        }
    }
}

/// Interviewer persona. Unknown values fall back to `Us`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Accent {
    #[default]
    Us,
    Uk,
    In,
    Au,
}

impl From<String> for Accent {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "uk" => Accent::Uk,
            "in" => Accent::In,
            "au" => Accent::Au,
            _ => Accent::Us,
        }
    }
}

impl From<Accent> for String {
    fn from(value: Accent) -> Self {
        match value {
            Accent::Us => "us",
            Accent::Uk => "uk",
            Accent::In => "in",
            Accent::Au => "au",
        }
        .to_string()
    }
}

/// Caller-supplied descriptor of the interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewProfile {
    pub role: String,
    #[serde(alias = "experienceLevel", default, deserialize_with = "null_as_default")]
    pub experience: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: String,
    pub interview_type: InterviewType,
    #[serde(alias = "accent", default, deserialize_with = "null_as_default")]
    pub interviewer_accent: Accent,
    #[serde(default)]
    pub resume_context: Option<String>,
    #[serde(default)]
    pub custom_questions: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixed_questions: Vec<String>,
    /// Blank or malformed ids are treated as absent.
    #[serde(default, deserialize_with = "lenient_uuid")]
    pub question_bank_id: Option<Uuid>,
    /// Candidate name, only used by feedback.
    #[serde(default)]
    pub name: Option<String>,
}

/// Clients send `null` for unset fields; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(raw) => raw,
    };
    let parsed = raw.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok());
    if parsed.is_none() {
        warn!("Ignoring malformed questionBankId {raw}");
    }
    Ok(parsed)
}

impl InterviewProfile {
    pub fn validate(&self) -> Result<(), String> {
        if self.role.trim().is_empty() {
            return Err("profile.role cannot be empty".to_string());
        }
        if self.fixed_questions.iter().any(|q| q.trim().is_empty()) {
            return Err("profile.fixedQuestions cannot contain blank questions".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

impl Speaker {
    /// Chat-completion role for this speaker.
    pub fn chat_role(&self) -> &'static str {
        match self {
            Speaker::Interviewer => "assistant",
            Speaker::Candidate => "user",
        }
    }

    pub fn transcript_label(&self) -> &'static str {
        match self {
            Speaker::Interviewer => "Interviewer",
            Speaker::Candidate => "Candidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Speaker,
    pub content: String,
}

/// POST /api/ai/interview body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRequest {
    pub profile: InterviewProfile,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default)]
    pub current_response: Option<String>,
}

impl InterviewRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.profile.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewReply {
    pub response: String,
    pub should_end: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Optional facts about the finished interview, embedded in the feedback prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewMeta {
    pub duration_minutes: Option<u32>,
    pub questions_answered: Option<u32>,
    pub ended_early: Option<bool>,
}

/// POST /api/ai/interview/feedback body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub profile: InterviewProfile,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default)]
    pub interview_data: Option<InterviewMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReply {
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_accepts_original_field_names() {
        let json = serde_json::json!({
            "role": "Backend Engineer",
            "experience": "Senior",
            "skills": "Rust, Postgres",
            "interviewType": "technical_coding",
            "interviewerAccent": "UK",
            "fixedQuestions": ["Q1", "Q2"]
        });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.interview_type, InterviewType::TechnicalCoding);
        assert_eq!(profile.interviewer_accent, Accent::Uk);
        assert_eq!(profile.fixed_questions.len(), 2);
        assert!(profile.question_bank_id.is_none());
    }

    #[test]
    fn test_profile_accepts_aliases() {
        let json = serde_json::json!({
            "role": "Dev",
            "experienceLevel": "Junior",
            "interviewType": "hr",
            "accent": "in"
        });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.experience, "Junior");
        assert_eq!(profile.interviewer_accent, Accent::In);
    }

    #[test]
    fn test_profile_accepts_client_default_shape() {
        // Exactly what the web client sends before the user touches the form.
        let json = serde_json::json!({
            "name": "",
            "role": "Frontend Developer",
            "experience": "",
            "skills": "",
            "interviewType": "technical",
            "customQuestions": "",
            "interviewerGender": "female",
            "interviewerVoice": "en-US-female-1",
            "interviewerAccent": "us",
            "enableVoice": true,
            "questionBankId": "",
            "fixedQuestions": []
        });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert!(profile.question_bank_id.is_none());
        assert_eq!(profile.interviewer_accent, Accent::Us);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_profile_tolerates_null_and_malformed_fields() {
        let json = serde_json::json!({
            "role": "Dev",
            "interviewType": "hr",
            "interviewerAccent": null,
            "experience": null,
            "skills": null,
            "fixedQuestions": null,
            "questionBankId": "not-a-uuid"
        });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.interviewer_accent, Accent::Us);
        assert_eq!(profile.experience, "");
        assert!(profile.fixed_questions.is_empty());
        assert!(profile.question_bank_id.is_none());

        let json = serde_json::json!({
            "role": "Dev",
            "interviewType": "hr",
            "questionBankId": 42
        });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert!(profile.question_bank_id.is_none());
    }

    #[test]
    fn test_profile_keeps_valid_question_bank_id() {
        let id = Uuid::new_v4();
        let json = serde_json::json!({
            "role": "Dev",
            "interviewType": "mixed",
            "questionBankId": format!(" {id} ")
        });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.question_bank_id, Some(id));
    }

    #[test]
    fn test_unknown_accent_falls_back_to_us() {
        assert_eq!(Accent::from("klingon".to_string()), Accent::Us);
    }

    #[test]
    fn test_unknown_interview_type_is_rejected() {
        let json = serde_json::json!({ "role": "Dev", "interviewType": "pairing" });
        assert!(serde_json::from_value::<InterviewProfile>(json).is_err());
    }

    #[test]
    fn test_blank_role_fails_validation() {
        let json = serde_json::json!({ "role": "  ", "interviewType": "mixed" });
        let profile: InterviewProfile = serde_json::from_value(json).unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_reply_omits_missing_error() {
        let reply = InterviewReply {
            response: "Hello".to_string(),
            should_end: false,
            error: None,
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value, serde_json::json!({ "response": "Hello", "shouldEnd": false }));
    }

    #[test]
    fn test_speaker_maps_to_chat_roles() {
        assert_eq!(Speaker::Interviewer.chat_role(), "assistant");
        assert_eq!(Speaker::Candidate.chat_role(), "user");
    }
}
