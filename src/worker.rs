//! Agent worker loop.
//!
//! Single consumer: claims the oldest pending task, flips it to
//! running, executes the registered agent, and records the terminal
//! status. At most one task runs at a time in this process; running
//! multiple worker processes needs external mutual exclusion this
//! design does not provide. The schedule check runs on its own timer
//! inside the same loop.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::{error, info};

use crate::agents::{self, FetchContext};
use crate::config::Config;
use crate::models::{AgentTask, TaskStatus};
use crate::scheduler;
use crate::sources;

/// Run the worker (and embedded scheduler) until ctrl-c.
pub async fn run(config: &Config, pool: &SqlitePool) -> Result<()> {
    // Make sure every agent-enabled source has its folder tree before
    // any agent tries to drop files into it.
    for source in sources::list_sources(pool).await? {
        if source.agent_enabled {
            sources::create_source_folders(&config.storage.puzzles_root, source.folder_name())?;
        }
    }

    let mut schedule_tick =
        tokio::time::interval(Duration::from_secs(config.agents.schedule_check_secs));
    let mut poll_tick = tokio::time::interval(Duration::from_secs(config.agents.worker_poll_secs));
    info!(
        schedule_check_secs = config.agents.schedule_check_secs,
        poll_secs = config.agents.worker_poll_secs,
        "agent worker started"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
            _ = schedule_tick.tick() => {
                if let Err(e) = scheduler::check_schedules(pool, Utc::now()).await {
                    error!("schedule check failed: {e:#}");
                }
            }
            _ = poll_tick.tick() => {
                // Drain the queue one task at a time
                loop {
                    match claim_next_task(pool).await {
                        Ok(Some(task)) => {
                            if let Err(e) = process_task(config, pool, &task).await {
                                error!(task = %task.id, "task processing failed: {e:#}");
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("worker queue poll failed: {e:#}");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Claim the oldest pending task by flipping it to running.
pub async fn claim_next_task(pool: &SqlitePool) -> Result<Option<AgentTask>> {
    let row = sqlx::query(
        "SELECT * FROM agent_tasks WHERE status = 'pending' ORDER BY queued_at LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let task = AgentTask {
        id: row.get("id"),
        source_id: row.get("source_id"),
        status: TaskStatus::Running.as_str().to_string(),
        queued_at: row.get("queued_at"),
        started_at: Some(Utc::now().timestamp()),
        completed_at: None,
        puzzles_found: None,
        error_message: None,
    };

    sqlx::query("UPDATE agent_tasks SET status = 'running', started_at = ? WHERE id = ?")
        .bind(task.started_at)
        .bind(&task.id)
        .execute(pool)
        .await?;

    Ok(Some(task))
}

/// Execute one claimed task and commit its terminal status.
pub async fn process_task(config: &Config, pool: &SqlitePool, task: &AgentTask) -> Result<()> {
    info!(task = %task.id, source = %task.source_id, "processing agent task");

    let Some(source) = sources::get_source(pool, &task.source_id).await? else {
        return finish_task(pool, &task.id, TaskStatus::Failed, None, Some("source not found"))
            .await;
    };

    let Some(agent_type) = source.agent_type.as_deref() else {
        return finish_task(
            pool,
            &task.id,
            TaskStatus::Failed,
            None,
            Some("source has no agent type configured"),
        )
        .await;
    };

    let Some(agent) = agents::get_agent(agent_type) else {
        let msg = format!("agent type '{agent_type}' not in registry");
        return finish_task(pool, &task.id, TaskStatus::Failed, None, Some(&msg)).await;
    };

    let import_dir = config
        .storage
        .puzzles_root
        .join(source.folder_name())
        .join("import");
    sources::create_source_folders(&config.storage.puzzles_root, source.folder_name())?;
    let ctx = FetchContext::new(&source, import_dir);

    match agent.fetch(&source, &ctx).await {
        Ok(outcome) => {
            info!(
                task = %task.id,
                puzzles_found = outcome.puzzles_found,
                "agent completed"
            );
            finish_task(
                pool,
                &task.id,
                TaskStatus::Completed,
                Some(outcome.puzzles_found),
                None,
            )
            .await
        }
        Err(e) => {
            error!(task = %task.id, "agent failed: {e:#}");
            finish_task(
                pool,
                &task.id,
                TaskStatus::Failed,
                None,
                Some(&format!("{e:#}")),
            )
            .await
        }
    }
}

async fn finish_task(
    pool: &SqlitePool,
    task_id: &str,
    status: TaskStatus,
    puzzles_found: Option<i64>,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE agent_tasks SET status = ?, completed_at = ?, puzzles_found = ?, error_message = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now().timestamp())
    .bind(puzzles_found)
    .bind(error_message)
    .bind(task_id)
    .execute(pool)
    .await?;
    Ok(())
}
