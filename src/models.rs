//! Core data models for the puzvault catalog.
//!
//! These types mirror the SQLite rows for sources, puzzles, and agent
//! tasks, plus the ephemeral import candidate that only exists on disk
//! between discovery and processing.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::path::PathBuf;

/// A configured puzzle feed origin.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: String,
    pub name: String,
    /// Optional human-friendly code; doubles as the on-disk folder name.
    pub short_code: Option<String>,
    /// IANA timezone name, used by agents for date math.
    pub timezone: Option<String>,
    pub agent_type: Option<String>,
    pub agent_config: Option<String>,
    pub agent_enabled: bool,
    pub schedule_enabled: bool,
    pub schedule_interval_hours: Option<i64>,
    pub last_scheduled_run_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Source {
    /// On-disk folder name: short code when set, id otherwise.
    pub fn folder_name(&self) -> &str {
        self.short_code.as_deref().unwrap_or(&self.id)
    }

    /// Next scheduled run time, or None when scheduling is off.
    /// A source that has never run is due immediately.
    pub fn next_run_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.schedule_enabled {
            return None;
        }
        let interval_hours = self.schedule_interval_hours?;
        match self.last_scheduled_run_at {
            None => Some(now),
            Some(last) => {
                let last = DateTime::from_timestamp(last, 0)?;
                Some(last + Duration::hours(interval_hours))
            }
        }
    }
}

/// A durable record of one successfully ingested puzzle.
#[derive(Debug, Clone)]
pub struct Puzzle {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub author: Option<String>,
    pub puzzle_date: Option<NaiveDate>,
    /// Empty string until the file move completes; readers treat an
    /// empty path as "not yet available".
    pub file_path: String,
    /// Lowercase hex SHA-256 of the primary file's bytes.
    pub file_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A filesystem-resident pair awaiting import. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub puz_path: PathBuf,
    pub meta_path: PathBuf,
}

/// Lifecycle of an agent task. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// One queued or finished agent invocation.
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub id: String,
    pub source_id: String,
    pub status: String,
    pub queued_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub puzzles_found: Option<i64>,
    pub error_message: Option<String>,
}
