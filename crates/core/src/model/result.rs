use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Question, QuestionId};

/// Chosen option index per question id. Absence means "unanswered".
pub type AnswerSheet = BTreeMap<QuestionId, usize>;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExamResultError {
    #[error("cannot score an exam with no questions")]
    Empty,

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("too many questions for a single exam: {len}")]
    TooManyQuestions { len: usize },

    #[error("total questions ({total}) does not match correct + wrong ({sum})")]
    CountMismatch { total: u32, sum: u32 },

    #[error("snapshot holds {snapshot} questions but total is {total}")]
    SnapshotMismatch { total: u32, snapshot: usize },

    #[error("percentage must be within 0..=100, got {0}")]
    InvalidPercentage(f64),
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scored, immutable summary of a submitted exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExamResultRecord")]
pub struct ExamResult {
    total_questions: u32,
    correct_count: u32,
    wrong_count: u32,
    percentage: f64,
    elapsed_seconds: u64,
    answers: AnswerSheet,
    questions_snapshot: Vec<Question>,
    timestamp: DateTime<Utc>,
}

/// Wire shape of [`ExamResult`]; counts are re-checked on the way in.
#[derive(Deserialize)]
struct ExamResultRecord {
    total_questions: u32,
    correct_count: u32,
    wrong_count: u32,
    percentage: f64,
    elapsed_seconds: u64,
    answers: AnswerSheet,
    questions_snapshot: Vec<Question>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ExamResultRecord> for ExamResult {
    type Error = ExamResultError;

    fn try_from(record: ExamResultRecord) -> Result<Self, Self::Error> {
        Self::from_persisted(
            record.total_questions,
            record.correct_count,
            record.wrong_count,
            record.percentage,
            record.elapsed_seconds,
            record.answers,
            record.questions_snapshot,
            record.timestamp,
        )
    }
}

/// One row of a post-exam review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    /// 1-based position within the exam.
    pub position: usize,
    pub question_id: QuestionId,
    pub text: String,
    pub correct_option: String,
    /// `None` when unanswered, or when the stored index names no option.
    pub chosen_option: Option<String>,
    pub is_correct: bool,
    pub explanation: String,
}

impl ExamResult {
    /// Score a finished exam.
    ///
    /// A question counts as correct only when its stored answer equals its
    /// correct option index; everything else (including no answer) is wrong.
    ///
    /// # Errors
    ///
    /// Returns `ExamResultError::Empty` when `questions` is empty,
    /// `ExamResultError::InvalidTimeRange` if `completed_at` precedes
    /// `started_at`, and `ExamResultError::TooManyQuestions` if the count
    /// does not fit in `u32`.
    pub fn score(
        questions: &[Question],
        answers: &AnswerSheet,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ExamResultError> {
        if questions.is_empty() {
            return Err(ExamResultError::Empty);
        }
        if completed_at < started_at {
            return Err(ExamResultError::InvalidTimeRange);
        }
        let total_questions = u32::try_from(questions.len()).map_err(|_| {
            ExamResultError::TooManyQuestions {
                len: questions.len(),
            }
        })?;

        let mut correct_count = 0_u32;
        let mut wrong_count = 0_u32;
        for question in questions {
            if question.is_correct(answers.get(question.id()).copied()) {
                correct_count = correct_count.saturating_add(1);
            } else {
                wrong_count = wrong_count.saturating_add(1);
            }
        }

        let percentage = round2(f64::from(correct_count) / f64::from(total_questions) * 100.0);
        let elapsed_seconds =
            u64::try_from(completed_at.signed_duration_since(started_at).num_seconds())
                .unwrap_or(0);

        Ok(Self {
            total_questions,
            correct_count,
            wrong_count,
            percentage,
            elapsed_seconds,
            answers: answers.clone(),
            questions_snapshot: questions.to_vec(),
            timestamp: completed_at,
        })
    }

    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ExamResultError` if counts, snapshot length or percentage
    /// are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        total_questions: u32,
        correct_count: u32,
        wrong_count: u32,
        percentage: f64,
        elapsed_seconds: u64,
        answers: AnswerSheet,
        questions_snapshot: Vec<Question>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ExamResultError> {
        let sum = correct_count.saturating_add(wrong_count);
        if sum != total_questions {
            return Err(ExamResultError::CountMismatch {
                total: total_questions,
                sum,
            });
        }
        if questions_snapshot.len() != total_questions as usize {
            return Err(ExamResultError::SnapshotMismatch {
                total: total_questions,
                snapshot: questions_snapshot.len(),
            });
        }
        if !(0.0..=100.0).contains(&percentage) {
            return Err(ExamResultError::InvalidPercentage(percentage));
        }

        Ok(Self {
            total_questions,
            correct_count,
            wrong_count,
            percentage,
            elapsed_seconds,
            answers,
            questions_snapshot,
            timestamp,
        })
    }

    /// Per-question breakdown in exam order, for review screens.
    #[must_use]
    pub fn review(&self) -> Vec<QuestionReview> {
        self.questions_snapshot
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let chosen = self.answers.get(q.id()).copied();
                QuestionReview {
                    position: i + 1,
                    question_id: q.id().clone(),
                    text: q.text().to_owned(),
                    correct_option: q.correct_option().to_owned(),
                    chosen_option: chosen.and_then(|idx| q.option(idx)).map(str::to_owned),
                    is_correct: q.is_correct(chosen),
                    explanation: q.explanation().to_owned(),
                }
            })
            .collect()
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn questions_snapshot(&self) -> &[Question] {
        &self.questions_snapshot
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;
    use crate::time::fixed_now;

    fn question(id: &str, correct: usize) -> Question {
        QuestionDraft::new(
            id,
            format!("Question {id}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
        )
        .validate(fixed_now())
        .unwrap()
    }

    #[test]
    fn scores_correct_wrong_and_percentage() {
        let questions: Vec<_> = (0..5).map(|i| question(&format!("q{i}"), 1)).collect();
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("q0"), 1);
        answers.insert(QuestionId::new("q1"), 1);
        answers.insert(QuestionId::new("q2"), 1);
        answers.insert(QuestionId::new("q3"), 0);
        answers.insert(QuestionId::new("q4"), 2);

        let started = fixed_now();
        let completed = started + chrono::Duration::milliseconds(95_900);
        let result = ExamResult::score(&questions, &answers, started, completed).unwrap();

        assert_eq!(result.total_questions(), 5);
        assert_eq!(result.correct_count(), 3);
        assert_eq!(result.wrong_count(), 2);
        assert!((result.percentage() - 60.0).abs() < f64::EPSILON);
        assert_eq!(result.elapsed_seconds(), 95);
        assert_eq!(result.timestamp(), completed);
        assert_eq!(result.questions_snapshot().len(), 5);
    }

    #[test]
    fn unanswered_counts_as_wrong() {
        let questions = vec![question("a", 0), question("b", 0), question("c", 0)];
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("a"), 0);

        let now = fixed_now();
        let result = ExamResult::score(&questions, &answers, now, now).unwrap();

        assert_eq!(result.correct_count(), 1);
        assert_eq!(result.wrong_count(), 2);
        assert!((result.percentage() - 33.33).abs() < 1e-9);
    }

    #[test]
    fn empty_exam_cannot_be_scored() {
        let now = fixed_now();
        let err = ExamResult::score(&[], &AnswerSheet::new(), now, now).unwrap_err();
        assert_eq!(err, ExamResultError::Empty);
    }

    #[test]
    fn from_persisted_checks_counts() {
        let err = ExamResult::from_persisted(
            2,
            1,
            0,
            50.0,
            3,
            AnswerSheet::new(),
            vec![question("a", 0), question("b", 0)],
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ExamResultError::CountMismatch { total: 2, sum: 1 });
    }

    #[test]
    fn from_persisted_checks_snapshot_length() {
        let err = ExamResult::from_persisted(
            2,
            1,
            1,
            50.0,
            3,
            AnswerSheet::new(),
            vec![question("a", 0)],
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExamResultError::SnapshotMismatch {
                total: 2,
                snapshot: 1
            }
        );
    }

    #[test]
    fn deserialize_rechecks_counts() {
        let now = fixed_now();
        let questions = vec![question("a", 0), question("b", 0)];
        let result = ExamResult::score(&questions, &AnswerSheet::new(), now, now).unwrap();

        let mut value = serde_json::to_value(&result).unwrap();
        let back: ExamResult = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back, result);

        value["correct_count"] = serde_json::json!(5);
        let err = serde_json::from_value::<ExamResult>(value).unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn review_reports_choices_in_order() {
        let questions = vec![question("a", 2), question("b", 0), question("c", 1)];
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("a"), 2);
        answers.insert(QuestionId::new("b"), 9);

        let now = fixed_now();
        let review = ExamResult::score(&questions, &answers, now, now)
            .unwrap()
            .review();

        assert_eq!(review.len(), 3);
        assert_eq!(review[0].position, 1);
        assert!(review[0].is_correct);
        assert_eq!(review[0].chosen_option.as_deref(), Some("c"));
        assert_eq!(review[1].chosen_option, None);
        assert!(!review[1].is_correct);
        assert_eq!(review[2].chosen_option, None);
        assert_eq!(review[2].correct_option, "b");
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert!((round2(66.666_666) - 66.67).abs() < 1e-9);
        assert!((round2(100.0) - 100.0).abs() < f64::EPSILON);
    }
}
