use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One entry of a stored question bank. Only `question` drives the interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankQuestion {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct QuestionBankRow {
    pub id: Uuid,
    pub name: String,
    pub questions: Value,
}

impl QuestionBankRow {
    /// Decodes the JSON question list, skipping entries without question text.
    pub fn parse_questions(&self) -> Result<Vec<BankQuestion>, serde_json::Error> {
        let questions: Vec<BankQuestion> = serde_json::from_value(self.questions.clone())?;
        Ok(questions
            .into_iter()
            .filter(|q| !q.question.trim().is_empty())
            .collect())
    }
}
