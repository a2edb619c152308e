use exam_core::model::{AnswerSheet, ExamResult, Question, QuestionId, QuestionTags};
use sqlx::Row;

use crate::repository::{ExamResultRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_usize(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) const QUESTION_COLUMNS: &str = r"
    id, text, options, correct_option_index, explanation,
    subject, chapter, topic, difficulty, created_at, modified_at
";

pub(crate) const RESULT_COLUMNS: &str = r"
    id, total_questions, correct_count, wrong_count, percentage,
    elapsed_seconds, answers, questions_snapshot, completed_at
";

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let correct_option_index = i64_to_usize(
        "correct_option_index",
        row.try_get::<i64, _>("correct_option_index").map_err(ser)?,
    )?;
    let tags = QuestionTags::new(
        row.try_get("subject").map_err(ser)?,
        row.try_get("chapter").map_err(ser)?,
        row.try_get("topic").map_err(ser)?,
        row.try_get("difficulty").map_err(ser)?,
    );

    Question::from_persisted(
        QuestionId::new(id),
        row.try_get("text").map_err(ser)?,
        options,
        correct_option_index,
        row.try_get("explanation").map_err(ser)?,
        tags,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("modified_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ExamResultRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let answers_json: String = row.try_get("answers").map_err(ser)?;
    let answers: AnswerSheet = serde_json::from_str(&answers_json).map_err(ser)?;
    let snapshot_json: String = row.try_get("questions_snapshot").map_err(ser)?;
    let snapshot: Vec<Question> = serde_json::from_str(&snapshot_json).map_err(ser)?;

    let result = ExamResult::from_persisted(
        i64_to_u32(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        i64_to_u32(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        i64_to_u32(
            "wrong_count",
            row.try_get::<i64, _>("wrong_count").map_err(ser)?,
        )?,
        row.try_get("percentage").map_err(ser)?,
        i64_to_u64(
            "elapsed_seconds",
            row.try_get::<i64, _>("elapsed_seconds").map_err(ser)?,
        )?,
        answers,
        snapshot,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)?;

    Ok(ExamResultRow::new(id, result))
}
