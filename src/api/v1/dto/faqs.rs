/*
 * Responsibility
 * - FAQ の request/response DTO
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repos::faq_repo::FaqRow;
use crate::services::id_codec::{self, IdCodec};

const MAX_QUESTION: usize = 500;
const MAX_ANSWER: usize = 2000;

fn validate_text(
    text: &str,
    max: usize,
    missing: &'static str,
    too_long: &'static str,
) -> Result<(), &'static str> {
    if text.trim().is_empty() {
        return Err(missing);
    }
    if text.chars().count() > max {
        return Err(too_long);
    }
    Ok(())
}

fn validate_question(q: &str) -> Result<(), &'static str> {
    validate_text(q, MAX_QUESTION, "question is required", "question must be <= 500 chars")
}

fn validate_answer(a: &str) -> Result<(), &'static str> {
    validate_text(a, MAX_ANSWER, "answer is required", "answer must be <= 2000 chars")
}

#[derive(Debug, Deserialize)]
pub struct CreateFaqRequest {
    pub question: String,
    pub answer: String,
}

impl CreateFaqRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_question(&self.question)?;
        validate_answer(&self.answer)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateFaqRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
}

impl UpdateFaqRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.question.is_none() && self.answer.is_none() {
            return Err("nothing to update");
        }
        if let Some(q) = &self.question {
            validate_question(q)?;
        }
        if let Some(a) = &self.answer {
            validate_answer(a)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqResponse {
    pub id: String,
    pub recipe_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FaqResponse {
    pub fn from_row(row: FaqRow, codec: &IdCodec) -> id_codec::Result<Self> {
        Ok(Self {
            id: codec.encode(row.id)?,
            recipe_id: codec.encode(row.recipe_id)?,
            question: row.question,
            answer: row.answer,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn from_rows(rows: Vec<FaqRow>, codec: &IdCodec) -> id_codec::Result<Vec<Self>> {
        rows.into_iter().map(|r| Self::from_row(r, codec)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_needs_both_fields() {
        let req = CreateFaqRequest {
            question: "Can I freeze it?".into(),
            answer: "  ".into(),
        };
        assert_eq!(req.validate(), Err("answer is required"));

        let req = CreateFaqRequest {
            question: "Can I freeze it?".into(),
            answer: "Up to a month.".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn update_checks_only_the_fields_present() {
        let empty = UpdateFaqRequest {
            question: None,
            answer: None,
        };
        assert_eq!(empty.validate(), Err("nothing to update"));

        let long = UpdateFaqRequest {
            question: Some("q".repeat(501)),
            answer: None,
        };
        assert_eq!(long.validate(), Err("question must be <= 500 chars"));

        let answer_only = UpdateFaqRequest {
            question: None,
            answer: Some("Yes.".into()),
        };
        assert!(answer_only.validate().is_ok());
    }
}
