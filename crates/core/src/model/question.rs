use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ids::QuestionId, tag::QuestionTags};

/// Minimum number of answer options a multiple-choice question must carry.
pub const MIN_OPTIONS: usize = 3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least {MIN_OPTIONS} options, got {len}")]
    TooFewOptions { len: usize },

    #[error("option {index} cannot be empty")]
    EmptyOption { index: usize },

    #[error("correct option index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },

    #[error("modified_at is before created_at")]
    InvalidTimeRange,
}

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Unvalidated question input, as authored or restored from a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub tags: QuestionTags,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        id: impl Into<QuestionId>,
        text: impl Into<String>,
        options: Vec<String>,
        correct_option_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            options,
            correct_option_index,
            explanation: String::new(),
            tags: QuestionTags::default(),
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: QuestionTags) -> Self {
        self.tags = tags;
        self
    }

    /// Validate the draft and stamp both timestamps with `now`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id, text or options are malformed, or
    /// if the correct option index does not point at an option.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Question, QuestionError> {
        Question::from_persisted(
            self.id,
            self.text,
            self.options,
            self.correct_option_index,
            self.explanation,
            self.tags,
            now,
            now,
        )
    }
}

/// A validated multiple-choice question.
///
/// Deserialization goes through [`Question::from_persisted`], so a backup or
/// stored snapshot cannot smuggle in a malformed question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord")]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_option_index: usize,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    tags: QuestionTags,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

/// Wire shape of [`Question`] before validation.
#[derive(Deserialize)]
struct QuestionRecord {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_option_index: usize,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    tags: QuestionTags,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        Self::from_persisted(
            record.id,
            record.text,
            record.options,
            record.correct_option_index,
            record.explanation,
            record.tags,
            record.created_at,
            record.modified_at,
        )
    }
}

impl Question {
    /// Rehydrate a question from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored fields violate question invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuestionId,
        text: String,
        options: Vec<String>,
        correct_option_index: usize,
        explanation: String,
        tags: QuestionTags,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        let id = QuestionId::new(id.as_str().trim());
        if id.is_blank() {
            return Err(QuestionError::EmptyId);
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions { len: options.len() });
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if correct_option_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_option_index,
                len: options.len(),
            });
        }
        if modified_at < created_at {
            return Err(QuestionError::InvalidTimeRange);
        }

        Ok(Self {
            id,
            text,
            options,
            correct_option_index,
            explanation: explanation.trim().to_string(),
            tags,
            created_at,
            modified_at,
        })
    }

    /// Returns a copy with `modified_at` moved to `now`.
    ///
    /// `created_at` is kept; a `now` earlier than `created_at` is clamped.
    #[must_use]
    pub fn touched(mut self, now: DateTime<Utc>) -> Self {
        self.modified_at = now.max(self.created_at);
        self
    }

    /// Returns a copy carrying an earlier record's `created_at`.
    ///
    /// Used by stores on upsert so the original creation time survives edits.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.modified_at = self.modified_at.max(created_at);
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn correct_option_index(&self) -> usize {
        self.correct_option_index
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        // Index is validated at construction.
        self.options
            .get(self.correct_option_index)
            .map_or("", String::as_str)
    }

    /// Returns true if `index` names one of this question's options.
    #[must_use]
    pub fn has_option(&self, index: usize) -> bool {
        index < self.options.len()
    }

    #[must_use]
    pub fn is_correct(&self, chosen: Option<usize>) -> bool {
        chosen == Some(self.correct_option_index)
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn tags(&self) -> &QuestionTags {
        &self.tags
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
