use chrono::{DateTime, Utc};
use std::sync::Arc;

use exam_core::model::{ExamResult, ExamResultId};
use storage::repository::ExamHistoryRepository;

use crate::error::HistoryError;

/// Presentation-agnostic row for a past exam.
///
/// No pre-formatted strings; the caller decides how to render timestamps
/// and percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryListItem {
    pub id: ExamResultId,
    pub completed_at: DateTime<Utc>,
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub percentage: f64,
    pub elapsed_seconds: u64,
}

impl HistoryListItem {
    #[must_use]
    pub fn from_result(id: ExamResultId, result: &ExamResult) -> Self {
        Self {
            id,
            completed_at: result.timestamp(),
            total: result.total_questions(),
            correct: result.correct_count(),
            wrong: result.wrong_count(),
            percentage: result.percentage(),
            elapsed_seconds: result.elapsed_seconds(),
        }
    }
}

/// Read side of the exam history.
#[derive(Clone)]
pub struct HistoryService {
    history: Arc<dyn ExamHistoryRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn ExamHistoryRepository>) -> Self {
        Self { history }
    }

    /// Most recent results first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on repository failures.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryListItem>, HistoryError> {
        let rows = self.history.list_results(limit).await?;
        Ok(rows
            .iter()
            .map(|row| HistoryListItem::from_result(row.id, &row.result))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Storage` (`NotFound` for unknown ids).
    pub async fn get_result(&self, id: ExamResultId) -> Result<ExamResult, HistoryError> {
        Ok(self.history.get_result(id).await?)
    }

    /// Delete every stored result, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on repository failures.
    pub async fn clear_history(&self) -> Result<u64, HistoryError> {
        let removed = self.history.clear_history().await?;
        tracing::info!(removed, "exam history cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use exam_core::model::{AnswerSheet, QuestionDraft, QuestionId};
    use exam_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, StorageError};

    fn scored(correct: bool, seconds: i64) -> ExamResult {
        let question = QuestionDraft::new(
            "q1",
            "Prompt",
            vec!["a".into(), "b".into(), "c".into()],
            1,
        )
        .validate(fixed_now())
        .unwrap();
        let mut answers = AnswerSheet::new();
        answers.insert(QuestionId::new("q1"), if correct { 1 } else { 0 });
        let start = fixed_now();
        ExamResult::score(&[question], &answers, start, start + Duration::seconds(seconds)).unwrap()
    }

    #[test]
    fn list_item_is_presentation_agnostic() {
        let result = scored(true, 42);
        let item = HistoryListItem::from_result(7, &result);

        assert_eq!(item.id, 7);
        assert_eq!(item.completed_at, fixed_now() + Duration::seconds(42));
        assert_eq!((item.total, item.correct, item.wrong), (1, 1, 0));
        assert!((item.percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(item.elapsed_seconds, 42);
    }

    #[tokio::test]
    async fn list_recent_returns_newest_first_and_clear_empties() {
        let repo = Arc::new(InMemoryRepository::new());
        let first = repo.append_result(&scored(false, 10)).await.unwrap();
        let second = repo.append_result(&scored(true, 20)).await.unwrap();

        let svc = HistoryService::new(repo);
        let items = svc.list_recent(10).await.unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(svc.get_result(first).await.unwrap().correct_count(), 0);

        assert_eq!(svc.clear_history().await.unwrap(), 2);
        assert!(svc.list_recent(10).await.unwrap().is_empty());
        let err = svc.get_result(first).await.unwrap_err();
        assert!(matches!(err, HistoryError::Storage(StorageError::NotFound)));
    }
}
