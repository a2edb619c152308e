use exam_core::model::{ExamResult, ExamResultId};

use super::SqliteRepository;
use super::mapping::{RESULT_COLUMNS, conn, map_result_row, ser, u64_to_i64};
use crate::repository::{ExamHistoryRepository, ExamResultRow, StorageError};

#[async_trait::async_trait]
impl ExamHistoryRepository for SqliteRepository {
    async fn append_result(&self, result: &ExamResult) -> Result<ExamResultId, StorageError> {
        let answers = serde_json::to_string(result.answers()).map_err(ser)?;
        let snapshot = serde_json::to_string(result.questions_snapshot()).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO exam_history (
                    total_questions, correct_count, wrong_count, percentage,
                    elapsed_seconds, answers, questions_snapshot, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_count()))
        .bind(i64::from(result.wrong_count()))
        .bind(result.percentage())
        .bind(u64_to_i64("elapsed_seconds", result.elapsed_seconds())?)
        .bind(answers)
        .bind(snapshot)
        .bind(result.timestamp())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: ExamResultId) -> Result<ExamResult, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM exam_history WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        Ok(map_result_row(&row)?.result)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ExamResultRow>, StorageError> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM exam_history ORDER BY completed_at DESC, id DESC LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }

    async fn clear_history(&self) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM exam_history")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }
}
