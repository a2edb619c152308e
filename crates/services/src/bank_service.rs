use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use exam_core::model::{ExamResult, Question, QuestionDraft, QuestionId};
use storage::repository::{ExamHistoryRepository, QuestionRepository, StorageError};

use crate::Clock;
use crate::error::QuestionBankError;

/// Snapshots include the whole history.
const SNAPSHOT_HISTORY_LIMIT: u32 = u32::MAX;

/// Full backup of the question bank and exam history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSnapshot {
    pub exported_at: DateTime<Utc>,
    pub questions: Vec<Question>,
    /// Oldest first, so a restore appends in the original order.
    pub history: Vec<ExamResult>,
}

/// Undecoded entries, so a bad item can be reported by position.
#[derive(Deserialize)]
struct RawSnapshot {
    exported_at: DateTime<Utc>,
    questions: Vec<serde_json::Value>,
    history: Vec<serde_json::Value>,
}

fn decode_section<T: DeserializeOwned>(
    section: &'static str,
    items: Vec<serde_json::Value>,
) -> Result<Vec<T>, QuestionBankError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item).map_err(|source| QuestionBankError::InvalidSnapshotItem {
                section,
                position: i + 1,
                source,
            })
        })
        .collect()
}

impl BankSnapshot {
    /// Parse a backup, validating every question and result.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::InvalidSnapshotItem` naming the section and
    /// 1-based position of the first bad entry, or
    /// `QuestionBankError::MalformedSnapshot` if the outer shape is wrong.
    pub fn from_json(raw: &str) -> Result<Self, QuestionBankError> {
        let raw: RawSnapshot =
            serde_json::from_str(raw).map_err(QuestionBankError::MalformedSnapshot)?;
        Ok(Self {
            exported_at: raw.exported_at,
            questions: decode_section("question", raw.questions)?,
            history: decode_section("history", raw.history)?,
        })
    }
}

/// Counts written by [`QuestionBankService::restore_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub questions: u64,
    pub results: u64,
}

/// Question CRUD plus backup export and restore.
#[derive(Clone)]
pub struct QuestionBankService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionBankService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { clock, questions }
    }

    /// Validate and store a new question, stamping both timestamps with now.
    ///
    /// An existing question with the same id is replaced but keeps its
    /// original `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Question` for validation failures.
    /// Returns `QuestionBankError::Storage` if persistence fails.
    pub async fn add_question(&self, draft: QuestionDraft) -> Result<QuestionId, QuestionBankError> {
        let question = draft.validate(self.clock.now())?;
        self.questions.upsert_question(&question).await?;
        Ok(question.id().clone())
    }

    /// Replace an existing question, keeping its `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage(StorageError::NotFound)` if the id
    /// is unknown, and `QuestionBankError::Question` for validation failures.
    pub async fn update_question(&self, draft: QuestionDraft) -> Result<Question, QuestionBankError> {
        let now = self.clock.now();
        let question = draft.validate(now)?;
        let existing = self
            .questions
            .get_question(question.id())
            .await?
            .ok_or(StorageError::NotFound)?;

        let question = question.with_created_at(existing.created_at()).touched(now);
        self.questions.upsert_question(&question).await?;
        Ok(question)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) if the id is unknown.
    pub async fn delete_question(&self, id: &QuestionId) -> Result<(), QuestionBankError> {
        self.questions.delete_question(id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` on repository failures.
    pub async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, QuestionBankError> {
        Ok(self.questions.get_question(id).await?)
    }

    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` on repository failures.
    pub async fn list_questions(&self) -> Result<Vec<Question>, QuestionBankError> {
        Ok(self.questions.list_questions().await?)
    }

    /// Validate every draft, then store them in one batch.
    ///
    /// Nothing is written if any draft is invalid.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::InvalidBatchItem` naming the 1-based
    /// position of the first invalid draft.
    pub async fn bulk_insert(&self, drafts: Vec<QuestionDraft>) -> Result<u64, QuestionBankError> {
        let now = self.clock.now();
        let questions = drafts
            .into_iter()
            .enumerate()
            .map(|(i, draft)| {
                draft
                    .validate(now)
                    .map_err(|source| QuestionBankError::InvalidBatchItem {
                        position: i + 1,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let written = self.questions.insert_questions(&questions).await?;
        tracing::info!(written, "questions imported");
        Ok(written)
    }

    //
    // ─── BACKUP ────────────────────────────────────────────────────────────────
    //

    /// Collect every question and history entry into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` on repository failures.
    pub async fn export_snapshot(
        &self,
        history: &dyn ExamHistoryRepository,
    ) -> Result<BankSnapshot, QuestionBankError> {
        let questions = self.questions.list_questions().await?;
        let mut rows = history.list_results(SNAPSHOT_HISTORY_LIMIT).await?;
        rows.reverse();

        Ok(BankSnapshot {
            exported_at: self.clock.now(),
            questions,
            history: rows.into_iter().map(|row| row.result).collect(),
        })
    }

    /// Upsert every snapshot question and append each history entry as a new row.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Storage` on repository failures. Rows
    /// written before the failure stay written.
    pub async fn restore_snapshot(
        &self,
        snapshot: &BankSnapshot,
        history: &dyn ExamHistoryRepository,
    ) -> Result<RestoreSummary, QuestionBankError> {
        let questions = self.questions.insert_questions(&snapshot.questions).await?;
        let mut results = 0;
        for result in &snapshot.history {
            history.append_result(result).await?;
            results += 1;
        }

        tracing::info!(
            questions,
            results,
            exported_at = %snapshot.exported_at,
            "snapshot restored"
        );
        Ok(RestoreSummary { questions, results })
    }
}
