use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an already-open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Sources table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            short_code TEXT UNIQUE,
            timezone TEXT,
            agent_type TEXT,
            agent_config TEXT,
            agent_enabled INTEGER NOT NULL DEFAULT 0,
            schedule_enabled INTEGER NOT NULL DEFAULT 0,
            schedule_interval_hours INTEGER,
            last_scheduled_run_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Puzzles table. The (source_id, file_hash) uniqueness backs the
    // dedup gate: byte-identical files can never produce two rows for
    // one source, even when two passes race.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS puzzles (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            title TEXT NOT NULL,
            author TEXT,
            puzzle_date TEXT,
            file_path TEXT NOT NULL DEFAULT '',
            file_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(source_id, file_hash),
            FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Agent task queue
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agent_tasks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            queued_at INTEGER NOT NULL,
            started_at INTEGER,
            completed_at INTEGER,
            puzzles_found INTEGER,
            error_message TEXT,
            FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_puzzles_source_id ON puzzles(source_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_puzzles_puzzle_date ON puzzles(puzzle_date DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_agent_tasks_status_queued ON agent_tasks(status, queued_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
