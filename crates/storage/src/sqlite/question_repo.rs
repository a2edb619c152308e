use exam_core::model::{Question, QuestionFilter, QuestionId};
use sqlx::{Executor, Sqlite};

use super::SqliteRepository;
use super::mapping::{QUESTION_COLUMNS, conn, map_question_row, ser, usize_to_i64};
use crate::repository::{QuestionRepository, StorageError};

async fn upsert_one<'e, E>(executor: E, question: &Question) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let options = serde_json::to_string(question.options()).map_err(ser)?;
    let tags = question.tags();

    sqlx::query(
        r"
        INSERT INTO questions (
            id, text, options, correct_option_index, explanation,
            subject, chapter, topic, difficulty, created_at, modified_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            -- keep created_at from the original insert
            text = excluded.text,
            options = excluded.options,
            correct_option_index = excluded.correct_option_index,
            explanation = excluded.explanation,
            subject = excluded.subject,
            chapter = excluded.chapter,
            topic = excluded.topic,
            difficulty = excluded.difficulty,
            modified_at = excluded.modified_at
        ",
    )
    .bind(question.id().as_str().to_owned())
    .bind(question.text().to_owned())
    .bind(options)
    .bind(usize_to_i64(
        "correct_option_index",
        question.correct_option_index(),
    )?)
    .bind(question.explanation().to_owned())
    .bind(tags.subject().map(str::to_owned))
    .bind(tags.chapter().map(str::to_owned))
    .bind(tags.topic().map(str::to_owned))
    .bind(tags.difficulty().map(str::to_owned))
    .bind(question.created_at())
    .bind(question.modified_at())
    .execute(executor)
    .await
    .map_err(conn)?;

    Ok(())
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        upsert_one(&self.pool, question).await
    }

    async fn insert_questions(&self, questions: &[Question]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        for question in questions {
            upsert_one(&mut *tx, question).await?;
        }
        tx.commit().await.map_err(conn)?;
        Ok(questions.len() as u64)
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_str().to_owned())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(id.as_str().to_owned())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        self.find_questions(&QuestionFilter::any()).await
    }

    async fn find_questions(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<Question>, StorageError> {
        let mut sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE 1 = 1");

        let constraints = [
            ("subject", filter.subject()),
            ("chapter", filter.chapter()),
            ("topic", filter.topic()),
            ("difficulty", filter.difficulty()),
        ];

        let mut bind_index = 1;
        for (column, value) in constraints {
            if value.is_some() {
                sql.push_str(" AND ");
                sql.push_str(column);
                sql.push_str(" = ?");
                sql.push_str(&bind_index.to_string());
                bind_index += 1;
            }
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut query = sqlx::query(&sql);
        for (_, value) in constraints {
            if let Some(value) = value {
                query = query.bind(value.to_owned());
            }
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        tracing::trace!(%filter, matched = out.len(), "find_questions");
        Ok(out)
    }
}
