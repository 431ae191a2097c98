//! Source management.
//!
//! Creating a source is a visible two-step sequence: commit the row,
//! then create its `{import, puzzles, errors}` directory tree. Deletion
//! mirrors it: commit the row delete (cascading to puzzles and tasks),
//! then remove the tree. No implicit side effects hang off row
//! lifecycle events.

use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::models::Source;

pub const SOURCE_SUBFOLDERS: [&str; 3] = ["import", "puzzles", "errors"];

#[derive(Debug, Clone, Default)]
pub struct NewSource {
    pub name: String,
    pub short_code: Option<String>,
    pub timezone: Option<String>,
    pub agent_type: Option<String>,
    pub agent_config: Option<String>,
    pub agent_enabled: bool,
    pub schedule_enabled: bool,
    pub schedule_interval_hours: Option<i64>,
}

/// Insert a source row, then create its folder tree.
pub async fn create_source(
    pool: &SqlitePool,
    puzzles_root: &Path,
    new: NewSource,
) -> Result<Source> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO sources (id, name, short_code, timezone, agent_type, agent_config,
                             agent_enabled, schedule_enabled, schedule_interval_hours,
                             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.short_code)
    .bind(&new.timezone)
    .bind(&new.agent_type)
    .bind(&new.agent_config)
    .bind(new.agent_enabled)
    .bind(new.schedule_enabled)
    .bind(new.schedule_interval_hours)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let source = get_source(pool, &id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("source vanished after insert: {id}"))?;

    // Row is committed; now make the on-disk layout.
    create_source_folders(puzzles_root, source.folder_name())?;
    info!(source = %source.name, folder = %source.folder_name(), "created source");

    Ok(source)
}

/// Delete a source row (cascade), then remove its folder tree.
pub async fn delete_source(pool: &SqlitePool, puzzles_root: &Path, identifier: &str) -> Result<()> {
    let Some(source) = find_by_id_or_short_code(pool, identifier).await? else {
        bail!("source not found: {identifier}");
    };
    let folder = source.folder_name().to_string();

    sqlx::query("DELETE FROM sources WHERE id = ?")
        .bind(&source.id)
        .execute(pool)
        .await?;

    let source_path = puzzles_root.join(&folder);
    if source_path.exists() {
        std::fs::remove_dir_all(&source_path)?;
    }
    info!(source = %source.name, folder = %folder, "deleted source");

    Ok(())
}

/// Ensure a source's `{import, puzzles, errors}` tree exists.
pub fn create_source_folders(puzzles_root: &Path, folder_name: &str) -> Result<()> {
    for sub in SOURCE_SUBFOLDERS {
        std::fs::create_dir_all(puzzles_root.join(folder_name).join(sub))?;
    }
    Ok(())
}

pub async fn get_source(pool: &SqlitePool, id: &str) -> Result<Option<Source>> {
    let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| source_from_row(&r)))
}

/// Resolve a source by short code first, then by id.
pub async fn find_by_id_or_short_code(
    pool: &SqlitePool,
    identifier: &str,
) -> Result<Option<Source>> {
    let row = sqlx::query("SELECT * FROM sources WHERE short_code = ?")
        .bind(identifier)
        .fetch_optional(pool)
        .await?;
    if let Some(r) = row {
        return Ok(Some(source_from_row(&r)));
    }
    get_source(pool, identifier).await
}

pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<Source>> {
    let rows = sqlx::query("SELECT * FROM sources ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(source_from_row).collect())
}

/// Folder-name → source-id map the scanner works from. Rebuilt once per
/// import pass; the database stays the single source of truth.
pub async fn folder_lookup(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    let sources = list_sources(pool).await?;
    Ok(sources
        .into_iter()
        .map(|s| (s.folder_name().to_string(), s.id))
        .collect())
}

pub fn source_from_row(row: &SqliteRow) -> Source {
    Source {
        id: row.get("id"),
        name: row.get("name"),
        short_code: row.get("short_code"),
        timezone: row.get("timezone"),
        agent_type: row.get("agent_type"),
        agent_config: row.get("agent_config"),
        agent_enabled: row.get("agent_enabled"),
        schedule_enabled: row.get("schedule_enabled"),
        schedule_interval_hours: row.get("schedule_interval_hours"),
        last_scheduled_run_at: row.get("last_scheduled_run_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
