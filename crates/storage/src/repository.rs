use async_trait::async_trait;
use exam_core::model::{ExamResult, ExamResultId, Question, QuestionFilter, QuestionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted exam result with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamResultRow {
    pub id: ExamResultId,
    pub result: ExamResult,
}

impl ExamResultRow {
    #[must_use]
    pub fn new(id: ExamResultId, result: ExamResult) -> Self {
        Self { id, result }
    }
}

/// Repository contract for the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or replace a question.
    ///
    /// On replace, the stored `created_at` is kept and every other field is
    /// taken from `question`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Upsert many questions as a single unit of work.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any question cannot be stored; nothing is
    /// written in that case.
    async fn insert_questions(&self, questions: &[Question]) -> Result<u64, StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError>;

    /// Delete a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist.
    async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError>;

    /// List every question, oldest first (`created_at`, then id).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError>;

    /// List questions matching every constraint set on `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_questions(&self, filter: &QuestionFilter)
    -> Result<Vec<Question>, StorageError>;
}

/// Append-only exam history.
#[async_trait]
pub trait ExamHistoryRepository: Send + Sync {
    /// Append a result and return its store-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_result(&self, result: &ExamResult) -> Result<ExamResultId, StorageError>;

    /// Fetch a result by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: ExamResultId) -> Result<ExamResult, StorageError>;

    /// List results newest first (`timestamp` DESC, id DESC).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_results(&self, limit: u32) -> Result<Vec<ExamResultRow>, StorageError>;

    /// Remove every result, returning how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn clear_history(&self) -> Result<u64, StorageError>;
}

#[derive(Default)]
struct HistoryLog {
    next_id: ExamResultId,
    rows: Vec<ExamResultRow>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    history: Arc<Mutex<HistoryLog>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_questions(questions: &mut [Question]) {
    questions.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}

fn merge_created_at(existing: Option<&Question>, incoming: &Question) -> Question {
    match existing {
        Some(old) => incoming.clone().with_created_at(old.created_at()),
        None => incoming.clone(),
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let merged = merge_created_at(guard.get(question.id()), question);
        guard.insert(question.id().clone(), merged);
        Ok(())
    }

    async fn insert_questions(&self, questions: &[Question]) -> Result<u64, StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for question in questions {
            let merged = merge_created_at(guard.get(question.id()), question);
            guard.insert(question.id().clone(), merged);
        }
        Ok(questions.len() as u64)
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(id).map(|_| ()).ok_or(StorageError::NotFound)
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        self.find_questions(&QuestionFilter::any()).await
    }

    async fn find_questions(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Question> = guard
            .values()
            .filter(|q| filter.matches(q.tags()))
            .cloned()
            .collect();
        sort_questions(&mut found);
        Ok(found)
    }
}

#[async_trait]
impl ExamHistoryRepository for InMemoryRepository {
    async fn append_result(&self, result: &ExamResult) -> Result<ExamResultId, StorageError> {
        let mut guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.next_id += 1;
        let id = guard.next_id;
        guard.rows.push(ExamResultRow::new(id, result.clone()));
        Ok(id)
    }

    async fn get_result(&self, id: ExamResultId) -> Result<ExamResult, StorageError> {
        let guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .rows
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.result.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ExamResultRow>, StorageError> {
        let guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows = guard.rows.clone();
        rows.sort_by(|a, b| {
            b.result
                .timestamp()
                .cmp(&a.result.timestamp())
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn clear_history(&self) -> Result<u64, StorageError> {
        let mut guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let removed = guard.rows.len() as u64;
        guard.rows.clear();
        Ok(removed)
    }
}

/// Aggregates the question bank and exam history behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub history: Arc<dyn ExamHistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let history: Arc<dyn ExamHistoryRepository> = Arc::new(repo);
        Self { questions, history }
    }
}
