use chrono::{DateTime, Utc};
use std::fmt;

use exam_core::model::{AnswerSheet, ExamResult, ExamResultError, ExamResultId, Question, QuestionId};

use super::progress::ExamProgress;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one loaded exam.
///
/// Holds the drawn questions, a cursor, and the candidate's answers. After
/// submission it also keeps the scored result (and its history id once
/// saved) so a review can be rendered until the next exam replaces it.
pub struct ExamSession {
    questions: Vec<Question>,
    current: usize,
    answers: AnswerSheet,
    started_at: DateTime<Utc>,
    result: Option<ExamResult>,
    result_id: Option<ExamResultId>,
}

impl ExamSession {
    /// Start a session over `questions`.
    ///
    /// # Errors
    ///
    /// Returns `ExamResultError::Empty` if no questions are provided.
    pub fn new(questions: Vec<Question>, started_at: DateTime<Utc>) -> Result<Self, ExamResultError> {
        if questions.is_empty() {
            return Err(ExamResultError::Empty);
        }
        Ok(Self {
            questions,
            current: 0,
            answers: AnswerSheet::new(),
            started_at,
            result: None,
            result_id: None,
        })
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    /// Advance one question; stays on the last one.
    pub fn next(&mut self) -> Option<&Question> {
        if self.current + 1 < self.questions.len() {
            self.current += 1;
        }
        self.current()
    }

    /// Step back one question; stays on the first one.
    pub fn previous(&mut self) -> Option<&Question> {
        self.current = self.current.saturating_sub(1);
        self.current()
    }

    /// Jump to `index` if it is in range; otherwise the cursor is left alone.
    pub fn go_to(&mut self, index: usize) -> Option<&Question> {
        if index < self.questions.len() {
            self.current = index;
        }
        self.current()
    }

    /// Record (or overwrite) the chosen option for a question.
    ///
    /// Neither the id nor the option index is checked here.
    pub fn save_answer(&mut self, question_id: QuestionId, option_index: usize) {
        self.answers.insert(question_id, option_index);
    }

    #[must_use]
    pub fn answer(&self, question_id: &QuestionId) -> Option<usize> {
        self.answers.get(question_id).copied()
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    /// Number of session questions that have an answer recorded.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| self.answers.contains_key(q.id()))
            .count()
    }

    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        ExamProgress {
            current: self.current + 1,
            total: self.questions.len(),
            answered: self.answered_count(),
        }
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.result.is_some()
    }

    #[must_use]
    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn result_id(&self) -> Option<ExamResultId> {
        self.result_id
    }

    /// Score the session once; later calls return the first result unchanged.
    pub(crate) fn score(&mut self, completed_at: DateTime<Utc>) -> Result<&ExamResult, ExamResultError> {
        if self.result.is_none() {
            let result = ExamResult::score(
                &self.questions,
                &self.answers,
                self.started_at,
                completed_at.max(self.started_at),
            )?;
            self.result = Some(result);
        }
        self.result.as_ref().ok_or(ExamResultError::Empty)
    }

    pub(crate) fn set_result_id(&mut self, id: ExamResultId) {
        self.result_id = Some(id);
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("started_at", &self.started_at)
            .field("submitted", &self.result.is_some())
            .field("result_id", &self.result_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
