//! Agent schedule evaluation.
//!
//! On every check, each schedule-enabled source either gets a queued
//! task or is skipped. A source that has never run is queued
//! immediately. Otherwise it must be past last-run + interval, past a
//! one-minute cooldown, and have no pending or running task already
//! (at most one in flight per source). Queueing stamps the check time,
//! not the completion time, so a slow agent cannot cause re-queues on
//! the next tick.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::Source;
use crate::sources::source_from_row;

const COOLDOWN_SECS: i64 = 60;

/// Evaluate all scheduled sources once; returns how many tasks were
/// queued.
pub async fn check_schedules(pool: &SqlitePool, now: DateTime<Utc>) -> Result<usize> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM sources
        WHERE schedule_enabled = 1
          AND agent_enabled = 1
          AND schedule_interval_hours IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut queued = 0;
    for row in &rows {
        let source = source_from_row(row);
        if maybe_queue_task(pool, &source, now).await? {
            queued += 1;
        }
    }
    Ok(queued)
}

/// Queue a task for the source if it is due. Returns whether one was
/// queued.
async fn maybe_queue_task(pool: &SqlitePool, source: &Source, now: DateTime<Utc>) -> Result<bool> {
    let Some(last_run) = source.last_scheduled_run_at else {
        info!(source = %source.name, "first scheduled run, queueing task");
        queue_task(pool, source, now).await?;
        return Ok(true);
    };

    let Some(next_run) = source.next_run_at(now) else {
        return Ok(false);
    };
    if now < next_run {
        return Ok(false);
    }

    let last_run = DateTime::from_timestamp(last_run, 0).unwrap_or(now);
    if now - last_run < Duration::seconds(COOLDOWN_SECS) {
        debug!(source = %source.name, "cooldown active, skipping scheduled run");
        return Ok(false);
    }

    let in_flight: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM agent_tasks WHERE source_id = ? AND status IN ('pending', 'running')",
    )
    .bind(&source.id)
    .fetch_one(pool)
    .await?;
    if in_flight > 0 {
        debug!(source = %source.name, "task already in flight, skipping");
        return Ok(false);
    }

    info!(
        source = %source.name,
        interval_hours = source.schedule_interval_hours,
        "scheduled run due, queueing task"
    );
    queue_task(pool, source, now).await?;
    Ok(true)
}

/// Queue a task outside the schedule (manual trigger). Does not stamp
/// `last_scheduled_run_at`, so the regular cadence is unaffected.
pub async fn enqueue_manual_task(pool: &SqlitePool, source_id: &str) -> Result<String> {
    let task_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO agent_tasks (id, source_id, status, queued_at) VALUES (?, ?, 'pending', ?)",
    )
    .bind(&task_id)
    .bind(source_id)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(task_id)
}

async fn queue_task(pool: &SqlitePool, source: &Source, now: DateTime<Utc>) -> Result<()> {
    let task_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO agent_tasks (id, source_id, status, queued_at) VALUES (?, ?, 'pending', ?)",
    )
    .bind(&task_id)
    .bind(&source.id)
    .bind(now.timestamp())
    .execute(pool)
    .await?;

    sqlx::query("UPDATE sources SET last_scheduled_run_at = ?, updated_at = ? WHERE id = ?")
        .bind(now.timestamp())
        .bind(now.timestamp())
        .bind(&source.id)
        .execute(pool)
        .await?;

    info!(task = %task_id, source = %source.name, "queued agent task");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::NewSource;
    use crate::{db, migrate, sources};
    use tempfile::TempDir;

    async fn setup_scheduled_source(
        pool: &SqlitePool,
        root: &std::path::Path,
        interval_hours: i64,
        last_run: Option<i64>,
    ) -> Source {
        let source = sources::create_source(
            pool,
            root,
            NewSource {
                name: "Scheduled".to_string(),
                agent_type: Some("null".to_string()),
                agent_enabled: true,
                schedule_enabled: true,
                schedule_interval_hours: Some(interval_hours),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        if let Some(ts) = last_run {
            sqlx::query("UPDATE sources SET last_scheduled_run_at = ? WHERE id = ?")
                .bind(ts)
                .bind(&source.id)
                .execute(pool)
                .await
                .unwrap();
        }
        sources::get_source(pool, &source.id).await.unwrap().unwrap()
    }

    async fn pending_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM agent_tasks WHERE status = 'pending'")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_run_queues_immediately() {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        let source = setup_scheduled_source(&pool, tmp.path(), 24, None).await;

        let queued = check_schedules(&pool, Utc::now()).await.unwrap();
        assert_eq!(queued, 1);
        assert_eq!(pending_count(&pool).await, 1);

        // Check time was stamped
        let source = sources::get_source(&pool, &source.id).await.unwrap().unwrap();
        assert!(source.last_scheduled_run_at.is_some());
    }

    #[tokio::test]
    async fn not_due_source_skipped() {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        let now = Utc::now();
        // Last ran 30 minutes ago with a 1 hour interval
        setup_scheduled_source(&pool, tmp.path(), 1, Some((now - Duration::minutes(30)).timestamp()))
            .await;

        let queued = check_schedules(&pool, now).await.unwrap();
        assert_eq!(queued, 0);
    }

    #[tokio::test]
    async fn cooldown_blocks_requeue_even_when_due() {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        let now = Utc::now();
        // A zero-hour interval makes the source permanently "due"; only
        // the cooldown stands between it and a rapid re-queue.
        setup_scheduled_source(&pool, tmp.path(), 0, Some((now - Duration::seconds(30)).timestamp()))
            .await;

        let queued = check_schedules(&pool, now).await.unwrap();
        assert_eq!(queued, 0);
        assert_eq!(pending_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn in_flight_task_blocks_requeue() {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        let now = Utc::now();
        let source = setup_scheduled_source(
            &pool,
            tmp.path(),
            1,
            Some((now - Duration::hours(2)).timestamp()),
        )
        .await;

        sqlx::query(
            "INSERT INTO agent_tasks (id, source_id, status, queued_at) VALUES ('t1', ?, 'running', 0)",
        )
        .bind(&source.id)
        .execute(&pool)
        .await
        .unwrap();

        let queued = check_schedules(&pool, now).await.unwrap();
        assert_eq!(queued, 0);
    }

    #[tokio::test]
    async fn due_source_queues_and_stamps_check_time() {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        let now = Utc::now();
        let source = setup_scheduled_source(
            &pool,
            tmp.path(),
            1,
            Some((now - Duration::hours(2)).timestamp()),
        )
        .await;

        let queued = check_schedules(&pool, now).await.unwrap();
        assert_eq!(queued, 1);

        let source = sources::get_source(&pool, &source.id).await.unwrap().unwrap();
        assert_eq!(source.last_scheduled_run_at, Some(now.timestamp()));

        // Next tick: the fresh stamp pushes next-due an hour out
        let queued = check_schedules(&pool, now + Duration::minutes(2)).await.unwrap();
        assert_eq!(queued, 0);
    }

    #[tokio::test]
    async fn disabled_sources_ignored() {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        sources::create_source(
            &pool,
            tmp.path(),
            NewSource {
                name: "Manual Only".to_string(),
                agent_enabled: true,
                schedule_enabled: false,
                schedule_interval_hours: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let queued = check_schedules(&pool, Utc::now()).await.unwrap();
        assert_eq!(queued, 0);
    }
}
