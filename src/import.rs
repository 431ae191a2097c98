//! Import pipeline orchestration.
//!
//! Drives one pass over every source's import directory: discover ready
//! pairs, then per candidate run validate → hash → dedup check → catalog
//! write, catching every failure at the candidate boundary and routing
//! it to quarantine. One bad candidate never aborts its siblings, and a
//! lost insert race reads exactly like an ordinary duplicate.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{self, InsertOutcome};
use crate::config::Config;
use crate::error::ImportError;
use crate::hash;
use crate::models::ImportCandidate;
use crate::preview;
use crate::quarantine;
use crate::scanner;
use crate::sources;
use crate::validate;

/// Counters for one scan-and-process pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub quarantined: usize,
}

/// Terminal state of one successfully handled candidate.
#[derive(Debug, PartialEq, Eq)]
enum CandidateOutcome {
    Imported(String),
    DuplicateDropped,
}

/// Run one full import pass across all sources.
pub async fn run_pass(
    config: &Config,
    pool: &SqlitePool,
    seen_unknown: &mut HashSet<String>,
) -> Result<PassSummary> {
    let root = &config.storage.puzzles_root;
    let mut summary = PassSummary::default();

    if !root.is_dir() {
        warn!(root = %root.display(), "puzzles root does not exist, skipping pass");
        return Ok(summary);
    }

    let folder_lookup = sources::folder_lookup(pool).await?;
    let batches = scanner::scan_root(root, &folder_lookup, seen_unknown)?;

    for batch in batches {
        let source_dir = root.join(&batch.folder_name);
        for candidate in &batch.candidates {
            match process_candidate(pool, root, &batch.folder_name, &batch.source_id, candidate)
                .await
            {
                Ok(CandidateOutcome::Imported(id)) => {
                    summary.imported += 1;
                    info!(
                        puzzle = %id,
                        file = %candidate.puz_path.display(),
                        "imported puzzle"
                    );
                }
                Ok(CandidateOutcome::DuplicateDropped) => {
                    summary.duplicates += 1;
                }
                Err(e) => {
                    summary.quarantined += 1;
                    quarantine::quarantine(&source_dir, candidate, &e.to_string());
                }
            }
        }
    }

    info!(
        imported = summary.imported,
        duplicates = summary.duplicates,
        quarantined = summary.quarantined,
        "import pass complete"
    );
    Ok(summary)
}

/// validate → hash → dedup → write for one candidate.
async fn process_candidate(
    pool: &SqlitePool,
    root: &Path,
    folder_name: &str,
    source_id: &str,
    candidate: &ImportCandidate,
) -> Result<CandidateOutcome, ImportError> {
    let validated = validate::validate(candidate)?;
    let file_hash = hash::hash_file(&candidate.puz_path)?;

    // Dedup pre-check. Not transactional with the insert below; the
    // (source_id, file_hash) constraint catches the race.
    if let Some(existing) = catalog::find_by_hash(pool, source_id, &file_hash).await? {
        info!(
            existing = %existing,
            hash = %&file_hash[..8],
            "duplicate puzzle already cataloged, deleting import files"
        );
        return drop_candidate(candidate);
    }

    let id = match catalog::insert_puzzle(pool, source_id, &validated, &file_hash).await? {
        InsertOutcome::Inserted(id) => id,
        InsertOutcome::DuplicateDetected => {
            // A concurrent pass won the insert; same outcome as above.
            info!(hash = %&file_hash[..8], "lost insert race, treating as duplicate");
            return drop_candidate(candidate);
        }
    };

    let final_path = move_to_puzzles(root, folder_name, candidate, &id)?;
    catalog::update_file_path(pool, &id, &final_path.to_string_lossy()).await?;

    Ok(CandidateOutcome::Imported(id))
}

/// Confirmed duplicate: delete both halves, report success.
fn drop_candidate(candidate: &ImportCandidate) -> Result<CandidateOutcome, ImportError> {
    for path in [&candidate.puz_path, &candidate.meta_path] {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
    }
    Ok(CandidateOutcome::DuplicateDropped)
}

/// Rename the pair into `puzzles/` under the catalog id, then render a
/// best-effort preview.
fn move_to_puzzles(
    root: &Path,
    folder_name: &str,
    candidate: &ImportCandidate,
    puzzle_id: &str,
) -> Result<std::path::PathBuf, ImportError> {
    let puzzles_dir = root.join(folder_name).join("puzzles");
    std::fs::create_dir_all(&puzzles_dir)?;

    let dest_puz = puzzles_dir.join(format!("{puzzle_id}.puz"));
    let dest_meta = puzzles_dir.join(format!("{puzzle_id}.meta.json"));
    let dest_preview = puzzles_dir.join(format!("{puzzle_id}.preview.svg"));

    std::fs::rename(&candidate.puz_path, &dest_puz)?;
    std::fs::rename(&candidate.meta_path, &dest_meta)?;

    if let Err(e) = preview::generate_preview(&dest_puz, &dest_preview) {
        warn!(puzzle = %puzzle_id, "preview generation failed: {e}");
    }

    Ok(dest_puz)
}

/// Counters for an orphan reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub backfilled: usize,
    pub removed: usize,
}

/// Resolve rows left with an empty file path by a crash between the
/// file move and the path commit: backfill the path when the moved file
/// is found, otherwise drop the row (the import files, if still in
/// `import/`, will be picked up again by a normal pass).
pub async fn reconcile_orphans(config: &Config, pool: &SqlitePool) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();
    let root = &config.storage.puzzles_root;

    for orphan in catalog::fetch_orphans(pool).await? {
        let Some(source) = sources::get_source(pool, &orphan.source_id).await? else {
            // Source deleted out from under the row; cascade should
            // have removed it, clean up regardless.
            catalog::delete_puzzle(pool, &orphan.id).await?;
            summary.removed += 1;
            continue;
        };

        let expected = root
            .join(source.folder_name())
            .join("puzzles")
            .join(format!("{}.puz", orphan.id));

        if expected.is_file() {
            catalog::update_file_path(pool, &orphan.id, &expected.to_string_lossy()).await?;
            summary.backfilled += 1;
            info!(puzzle = %orphan.id, "backfilled orphaned catalog row");
        } else {
            catalog::delete_puzzle(pool, &orphan.id).await?;
            summary.removed += 1;
            warn!(puzzle = %orphan.id, "removed orphaned catalog row with no file");
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentsConfig, DbConfig, ImporterConfig, StorageConfig};
    use crate::puz::tests::build_puz;
    use crate::sources::NewSource;
    use crate::{db, migrate};
    use std::fs;
    use tempfile::TempDir;

    fn test_config(root: &Path) -> Config {
        Config {
            db: DbConfig {
                path: root.join("pzv.sqlite"),
            },
            storage: StorageConfig {
                puzzles_root: root.to_path_buf(),
            },
            importer: ImporterConfig::default(),
            agents: AgentsConfig::default(),
        }
    }

    async fn setup() -> (TempDir, Config, SqlitePool, String) {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let source = sources::create_source(
            &pool,
            tmp.path(),
            NewSource {
                name: "Source A".to_string(),
                short_code: Some("source-a".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (tmp, config, pool, source.id)
    }

    fn drop_pair(import_dir: &Path, base: &str, meta: &str) {
        fs::write(
            import_dir.join(format!("{base}.puz")),
            build_puz(3, 3, "Grid Title", "Grid Author", b"CAT.A.DOG", &["c1", "c2"]),
        )
        .unwrap();
        fs::write(import_dir.join(format!("{base}.meta.json")), meta).unwrap();
    }

    #[tokio::test]
    async fn end_to_end_import() {
        let (tmp, config, pool, source_id) = setup().await;
        let import_dir = tmp.path().join("source-a/import");
        drop_pair(
            &import_dir,
            "puzzle1",
            r#"{"puzzle_date":"2025-01-01","title":"Test"}"#,
        );

        let mut seen = HashSet::new();
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.quarantined, 0);

        // import/ is empty, files live under the catalog id
        assert!(fs::read_dir(&import_dir).unwrap().next().is_none());
        let entries = catalog::list_for_source(&pool, &source_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.title, "Test");
        assert_eq!(
            entry.puzzle_date,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        let stored = tmp
            .path()
            .join("source-a/puzzles")
            .join(format!("{}.puz", entry.id));
        assert!(stored.is_file());
        assert_eq!(entry.file_path, stored.to_string_lossy());
        assert!(tmp
            .path()
            .join("source-a/puzzles")
            .join(format!("{}.preview.svg", entry.id))
            .is_file());
    }

    #[tokio::test]
    async fn duplicate_second_drop_is_a_noop() {
        let (tmp, config, pool, source_id) = setup().await;
        let import_dir = tmp.path().join("source-a/import");
        let mut seen = HashSet::new();

        drop_pair(
            &import_dir,
            "puzzle1",
            r#"{"puzzle_date":"2025-01-01","title":"Test"}"#,
        );
        run_pass(&config, &pool, &mut seen).await.unwrap();

        // Byte-identical file under a new name
        drop_pair(
            &import_dir,
            "puzzle1b",
            r#"{"puzzle_date":"2025-01-01","title":"Test"}"#,
        );
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.duplicates, 1);

        assert_eq!(
            catalog::list_for_source(&pool, &source_id).await.unwrap().len(),
            1
        );
        assert!(fs::read_dir(&import_dir).unwrap().next().is_none());
        assert!(tmp.path().join("source-a/errors").read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn validation_failure_quarantines_both_files() {
        let (tmp, config, pool, source_id) = setup().await;
        let import_dir = tmp.path().join("source-a/import");
        drop_pair(&import_dir, "nodate", r#"{"title":"No Date"}"#);

        let mut seen = HashSet::new();
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary.quarantined, 1);

        assert!(fs::read_dir(&import_dir).unwrap().next().is_none());
        let error_names: Vec<String> = fs::read_dir(tmp.path().join("source-a/errors"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(error_names.len(), 3);
        assert!(error_names.iter().any(|n| n.ends_with(".error.txt")));
        assert!(catalog::list_for_source(&pool, &source_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn bad_primary_file_quarantined_not_imported() {
        let (tmp, config, pool, _) = setup().await;
        let import_dir = tmp.path().join("source-a/import");
        fs::write(import_dir.join("garbage.puz"), b"not a real puzzle").unwrap();
        fs::write(
            import_dir.join("garbage.meta.json"),
            r#"{"puzzle_date":"2025-01-01"}"#,
        )
        .unwrap();

        let mut seen = HashSet::new();
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.quarantined, 1);
    }

    #[tokio::test]
    async fn failure_does_not_abort_siblings() {
        let (tmp, config, pool, source_id) = setup().await;
        let import_dir = tmp.path().join("source-a/import");
        drop_pair(&import_dir, "a_bad", r#"{"title":"no date"}"#);
        drop_pair(
            &import_dir,
            "b_good",
            r#"{"puzzle_date":"2025-02-02"}"#,
        );

        let mut seen = HashSet::new();
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary.quarantined, 1);
        assert_eq!(summary.imported, 1);
        assert_eq!(
            catalog::list_for_source(&pool, &source_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn lone_files_left_untouched() {
        let (tmp, config, pool, _) = setup().await;
        let import_dir = tmp.path().join("source-a/import");
        fs::write(import_dir.join("waiting.puz"), b"x").unwrap();

        let mut seen = HashSet::new();
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary, PassSummary::default());
        assert!(import_dir.join("waiting.puz").is_file());
    }

    #[tokio::test]
    async fn missing_root_skips_pass() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp.path().join("nonexistent"));
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();

        let mut seen = HashSet::new();
        let summary = run_pass(&config, &pool, &mut seen).await.unwrap();
        assert_eq!(summary, PassSummary::default());
    }

    #[tokio::test]
    async fn orphan_with_file_is_backfilled() {
        let (tmp, config, pool, source_id) = setup().await;

        let validated = crate::validate::ValidatedImport {
            title: "Orphan".to_string(),
            author: None,
            puzzle_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        };
        let InsertOutcome::Inserted(id) =
            catalog::insert_puzzle(&pool, &source_id, &validated, &"ee".repeat(32))
                .await
                .unwrap()
        else {
            panic!("expected insert");
        };
        // Simulate a crash after the move but before the path commit
        let moved = tmp.path().join("source-a/puzzles").join(format!("{id}.puz"));
        fs::write(&moved, b"moved bytes").unwrap();

        let summary = reconcile_orphans(&config, &pool).await.unwrap();
        assert_eq!(summary.backfilled, 1);
        assert_eq!(summary.removed, 0);

        let entries = catalog::list_for_source(&pool, &source_id).await.unwrap();
        assert_eq!(entries[0].file_path, moved.to_string_lossy());
    }

    #[tokio::test]
    async fn orphan_without_file_is_removed() {
        let (_tmp, config, pool, source_id) = setup().await;

        let validated = crate::validate::ValidatedImport {
            title: "Orphan".to_string(),
            author: None,
            puzzle_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        };
        catalog::insert_puzzle(&pool, &source_id, &validated, &"ff".repeat(32))
            .await
            .unwrap();

        let summary = reconcile_orphans(&config, &pool).await.unwrap();
        assert_eq!(summary.backfilled, 0);
        assert_eq!(summary.removed, 1);
        assert!(catalog::list_for_source(&pool, &source_id)
            .await
            .unwrap()
            .is_empty());
    }
}
