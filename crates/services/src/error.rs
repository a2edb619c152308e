//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{ExamResultError, QuestionError, QuestionFilter};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the exam engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamError {
    /// Nothing in the whole bank satisfies the filter.
    #[error("no questions match filter ({filter})")]
    NoMatch { filter: QuestionFilter },
    #[error("requested question count must be at least 1")]
    InvalidQuestionCount,
    /// Submit or finalize was called with no loaded exam.
    #[error("no exam is loaded")]
    NotLoaded,
    #[error("exam has not been submitted")]
    NotSubmitted,
    /// The result was scored and kept on the session, but the history write failed.
    #[error("exam result could not be saved: {0}")]
    Persistence(#[source] StorageError),
    #[error(transparent)]
    Result(#[from] ExamResultError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuestionBankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error("question #{position} in batch is invalid: {source}")]
    InvalidBatchItem {
        position: usize,
        #[source]
        source: QuestionError,
    },

    /// A backup entry failed to decode or validate; `position` is 1-based
    /// within its section.
    #[error("backup {section} entry #{position} is invalid: {source}")]
    InvalidSnapshotItem {
        section: &'static str,
        position: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("backup is not a valid snapshot: {0}")]
    MalformedSnapshot(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `HistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
