use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned schema migrations.
///
/// Version 1 creates the question bank and exam history tables with their
/// filter and ordering indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: question bank + exam history.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id TEXT PRIMARY KEY,
                    text TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_option_index INTEGER NOT NULL CHECK (correct_option_index >= 0),
                    explanation TEXT NOT NULL DEFAULT '',
                    subject TEXT,
                    chapter TEXT,
                    topic TEXT,
                    difficulty TEXT,
                    created_at TEXT NOT NULL,
                    modified_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS exam_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    total_questions INTEGER NOT NULL CHECK (total_questions > 0),
                    correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
                    wrong_count INTEGER NOT NULL CHECK (wrong_count >= 0),
                    percentage REAL NOT NULL CHECK (percentage BETWEEN 0 AND 100),
                    elapsed_seconds INTEGER NOT NULL CHECK (elapsed_seconds >= 0),
                    answers TEXT NOT NULL,
                    questions_snapshot TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_questions_subject ON questions (subject);",
            "CREATE INDEX IF NOT EXISTS idx_questions_chapter ON questions (chapter);",
            "CREATE INDEX IF NOT EXISTS idx_questions_topic ON questions (topic);",
            "CREATE INDEX IF NOT EXISTS idx_questions_difficulty ON questions (difficulty);",
            "CREATE INDEX IF NOT EXISTS idx_questions_created ON questions (created_at, id);",
            "CREATE INDEX IF NOT EXISTS idx_exam_history_completed ON exam_history (completed_at, id);",
        ] {
            sqlx::query(ddl).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied sqlite schema migration");
    }

    Ok(())
}
