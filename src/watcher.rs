//! The importer daemon: event-driven watching with debounce, or plain
//! interval polling.
//!
//! Both strategies funnel into the same single pass over every source,
//! so at most one scan-and-process pass is ever in flight. In event
//! mode a burst of filesystem notifications collapses into one pass:
//! each event re-arms a single-slot debounce deadline, and the pass
//! runs only after the directory has gone quiet.

use anyhow::{Context, Result};
use notify::{RecursiveMode, Watcher};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::import;
use crate::sources;

/// Single-slot resettable deadline. Arming while armed just pushes the
/// deadline back; firing clears the slot.
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the armed deadline; pends forever while disarmed.
    /// Clears the slot when it fires.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

/// File extensions that should wake the importer.
fn is_relevant(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("puz") | Some("json")
    )
}

/// Run the importer daemon until ctrl-c.
pub async fn run(config: &Config, pool: &SqlitePool, poll: bool) -> Result<()> {
    let mut seen_unknown = HashSet::new();

    // Resolve rows orphaned by a previous crash before scanning.
    let reconciled = import::reconcile_orphans(config, pool).await?;
    if reconciled.backfilled + reconciled.removed > 0 {
        info!(
            backfilled = reconciled.backfilled,
            removed = reconciled.removed,
            "reconciled orphaned catalog rows"
        );
    }

    info!("running initial scan");
    if let Err(e) = import::run_pass(config, pool, &mut seen_unknown).await {
        error!("initial scan failed: {e:#}");
    }

    if poll {
        run_polling(config, pool, &mut seen_unknown).await
    } else {
        run_watching(config, pool, &mut seen_unknown).await
    }
}

/// Fixed-interval variant: one pass, then sleep. Passes cannot overlap
/// because the loop blocks on the pass.
async fn run_polling(
    config: &Config,
    pool: &SqlitePool,
    seen_unknown: &mut HashSet<String>,
) -> Result<()> {
    let interval = Duration::from_secs(config.importer.scan_interval_secs);
    info!(interval_secs = interval.as_secs(), "polling for imports");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = import::run_pass(config, pool, seen_unknown).await {
                    error!("import pass failed: {e:#}");
                }
            }
        }
    }
}

/// Event-driven variant: notify watchers on each known source's import
/// directory, coalesced through the debouncer.
async fn run_watching(
    config: &Config,
    pool: &SqlitePool,
    seen_unknown: &mut HashSet<String>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                if event.paths.iter().any(|p| is_relevant(p)) {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!("filesystem watch error: {e}"),
        }
    })
    .context("failed to create filesystem watcher")?;

    let root = &config.storage.puzzles_root;
    let mut watched = 0usize;
    for source in sources::list_sources(pool).await? {
        let import_dir = root.join(source.folder_name()).join("import");
        if !import_dir.is_dir() {
            continue;
        }
        match watcher.watch(&import_dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                info!(dir = %import_dir.display(), "watching");
                watched += 1;
            }
            Err(e) => warn!(dir = %import_dir.display(), "could not watch: {e}"),
        }
    }
    if watched == 0 {
        warn!("no import directories found to watch");
    }

    let mut debounce = Debouncer::new(Duration::from_millis(config.importer.debounce_ms));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
            Some(()) = rx.recv() => {
                debounce.arm();
            }
            _ = debounce.fired() => {
                if let Err(e) = import::run_pass(config, pool, seen_unknown).await {
                    error!("import pass failed: {e:#}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn relevant_extensions() {
        assert!(is_relevant(&PathBuf::from("/x/import/a.puz")));
        assert!(is_relevant(&PathBuf::from("/x/import/a.meta.json")));
        assert!(!is_relevant(&PathBuf::from("/x/import/a.tmp")));
        assert!(!is_relevant(&PathBuf::from("/x/import/README")));
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_fires_once_after_quiescence() {
        let mut d = Debouncer::new(Duration::from_secs(1));
        d.arm();
        assert!(d.is_armed());

        d.fired().await;
        assert!(!d.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_resets_the_deadline() {
        let mut d = Debouncer::new(Duration::from_secs(1));
        d.arm();
        tokio::time::advance(Duration::from_millis(900)).await;
        d.arm();

        // 900ms after the re-arm the original deadline has long passed,
        // but the slot must still be pending.
        let fired = tokio::time::timeout(Duration::from_millis(900), d.fired()).await;
        assert!(fired.is_err());
        assert!(d.is_armed());

        d.fired().await;
        assert!(!d.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_debouncer_pends() {
        let mut d = Debouncer::new(Duration::from_secs(1));
        let fired = tokio::time::timeout(Duration::from_secs(60), d.fired()).await;
        assert!(fired.is_err());
    }
}
