//! Puzzle catalog storage.
//!
//! The write path is deliberately split: `insert_puzzle` commits a row
//! with an empty `file_path` placeholder and hands back the generated
//! id, the caller moves the files, then `update_file_path` records the
//! final location. A uniqueness violation on (source_id, file_hash) is
//! surfaced as an explicit [`InsertOutcome::DuplicateDetected`] rather
//! than an error, so a lost write race reads the same as an ordinary
//! duplicate.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::Puzzle;
use crate::validate::ValidatedImport;

/// Result of a catalog insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row committed; files should now be moved under this id.
    Inserted(String),
    /// (source_id, file_hash) already present; nothing was written.
    DuplicateDetected,
}

/// Look up an existing entry by content fingerprint.
pub async fn find_by_hash(
    pool: &SqlitePool,
    source_id: &str,
    file_hash: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM puzzles WHERE source_id = ? AND file_hash = ?")
        .bind(source_id)
        .bind(file_hash)
        .fetch_optional(pool)
        .await
}

/// Insert a new catalog row with an empty file-path placeholder.
pub async fn insert_puzzle(
    pool: &SqlitePool,
    source_id: &str,
    validated: &ValidatedImport,
    file_hash: &str,
) -> Result<InsertOutcome, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO puzzles (id, source_id, title, author, puzzle_date, file_path, file_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, '', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(source_id)
    .bind(&validated.title)
    .bind(&validated.author)
    .bind(validated.puzzle_date.format("%Y-%m-%d").to_string())
    .bind(file_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(id)),
        Err(sqlx::Error::Database(db_err))
            if db_err.kind() == sqlx::error::ErrorKind::UniqueViolation =>
        {
            Ok(InsertOutcome::DuplicateDetected)
        }
        Err(e) => Err(e),
    }
}

/// Backfill the final file path once the move has completed.
pub async fn update_file_path(
    pool: &SqlitePool,
    id: &str,
    file_path: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE puzzles SET file_path = ?, updated_at = ? WHERE id = ?")
        .bind(file_path)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rows whose file move never got recorded: the orphan window.
pub async fn fetch_orphans(pool: &SqlitePool) -> Result<Vec<Puzzle>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM puzzles WHERE file_path = ''")
        .fetch_all(pool)
        .await?;
    rows.iter().map(puzzle_from_row).collect()
}

pub async fn delete_puzzle(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM puzzles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_for_source(pool: &SqlitePool, source_id: &str) -> Result<Vec<Puzzle>> {
    let rows = sqlx::query(
        "SELECT * FROM puzzles WHERE source_id = ? ORDER BY puzzle_date DESC, created_at DESC",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(puzzle_from_row).collect::<Result<_, _>>()?)
}

fn puzzle_from_row(row: &SqliteRow) -> Result<Puzzle, sqlx::Error> {
    let date_str: Option<String> = row.get("puzzle_date");
    Ok(Puzzle {
        id: row.get("id"),
        source_id: row.get("source_id"),
        title: row.get("title"),
        author: row.get("author"),
        puzzle_date: date_str.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        file_path: row.get("file_path"),
        file_hash: row.get("file_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use chrono::NaiveDate;

    async fn setup() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO sources (id, name, created_at, updated_at) VALUES ('src-1', 'Test', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn validated() -> ValidatedImport {
        ValidatedImport {
            title: "Test".to_string(),
            author: None,
            puzzle_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn insert_then_duplicate_maps_constraint() {
        let pool = setup().await;

        let first = insert_puzzle(&pool, "src-1", &validated(), "aa".repeat(32).as_str())
            .await
            .unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = insert_puzzle(&pool, "src-1", &validated(), "aa".repeat(32).as_str())
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome::DuplicateDetected);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM puzzles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn same_hash_different_source_allowed() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO sources (id, name, created_at, updated_at) VALUES ('src-2', 'Other', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let hash = "bb".repeat(32);
        assert!(matches!(
            insert_puzzle(&pool, "src-1", &validated(), &hash).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert!(matches!(
            insert_puzzle(&pool, "src-2", &validated(), &hash).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
    }

    #[tokio::test]
    async fn path_backfill_clears_orphan_state() {
        let pool = setup().await;
        let hash = "cc".repeat(32);
        let InsertOutcome::Inserted(id) =
            insert_puzzle(&pool, "src-1", &validated(), &hash).await.unwrap()
        else {
            panic!("expected insert");
        };

        let orphans = fetch_orphans(&pool).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, id);

        update_file_path(&pool, &id, "/data/puzzles/x.puz")
            .await
            .unwrap();
        assert!(fetch_orphans(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_hash_round_trip() {
        let pool = setup().await;
        let hash = "dd".repeat(32);
        assert_eq!(find_by_hash(&pool, "src-1", &hash).await.unwrap(), None);

        let InsertOutcome::Inserted(id) =
            insert_puzzle(&pool, "src-1", &validated(), &hash).await.unwrap()
        else {
            panic!("expected insert");
        };
        assert_eq!(
            find_by_hash(&pool, "src-1", &hash).await.unwrap(),
            Some(id)
        );
    }
}
