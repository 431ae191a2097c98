//! Agent abstraction and registry.
//!
//! An agent is anything that deposits a `(puzzle, sidecar)` pair into a
//! source's `import/` directory; the importer makes no assumption about
//! how the pair was produced. The registry is a fixed compile-time
//! table from agent type to constructor; there is no runtime plugin
//! discovery.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::models::Source;

/// Result of one agent invocation.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub puzzles_found: i64,
}

/// Per-invocation context handed to the agent.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// The source's import directory; agents drop file pairs here.
    pub import_dir: PathBuf,
    /// Today in the source's configured timezone (UTC when unset or
    /// unrecognized), for outlets that publish by local date.
    pub today: NaiveDate,
}

impl FetchContext {
    pub fn new(source: &Source, import_dir: PathBuf) -> Self {
        let today = source
            .timezone
            .as_deref()
            .and_then(|name| name.parse::<chrono_tz::Tz>().ok())
            .map(|tz| Utc::now().with_timezone(&tz).date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());
        Self { import_dir, today }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Fetch puzzles for the source, dropping file pairs into
    /// `ctx.import_dir`. Returning Err fails the task.
    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<FetchOutcome>;
}

type AgentFactory = fn() -> Box<dyn Agent>;

/// The fixed agent table. New agents are added here.
const REGISTRY: &[(&str, AgentFactory)] = &[("null", || Box::new(NullAgent))];

/// Resolve an agent type to a fresh instance.
pub fn get_agent(agent_type: &str) -> Option<Box<dyn Agent>> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == agent_type)
        .map(|(_, factory)| factory())
}

pub fn agent_types() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Test agent: logs and fetches nothing.
struct NullAgent;

#[derive(Debug, Default, Deserialize)]
struct NullConfig {
    #[serde(default)]
    extra_string: Option<String>,
}

#[async_trait]
impl Agent for NullAgent {
    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<FetchOutcome> {
        let config: NullConfig =
            serde_json::from_str(source.agent_config.as_deref().unwrap_or("{}"))?;

        info!(source = %source.name, today = %ctx.today, "null agent running");
        if let Some(extra) = &config.extra_string {
            info!("extra config string: {extra}");
        }
        info!("null agent fetches nothing");

        Ok(FetchOutcome { puzzles_found: 0 })
    }
}
