//! Discovery of ready import candidates.
//!
//! Walks the puzzles root one level deep: each subdirectory named after a
//! known source is checked for an `import/` directory, and every `.puz`
//! file with a sibling `.meta.json` sharing its base name becomes a
//! candidate. Lone halves are left alone until their sibling appears.
//! This module never mutates the filesystem or the database.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::models::ImportCandidate;

pub const PUZ_EXTENSION: &str = "puz";

/// Candidates found for one source directory.
#[derive(Debug)]
pub struct SourceBatch {
    pub source_id: String,
    pub folder_name: String,
    pub candidates: Vec<ImportCandidate>,
}

/// Enumerate ready candidates across all source directories.
///
/// `folder_lookup` maps on-disk folder names to source ids. Unknown
/// folders are skipped; `seen_unknown` suppresses repeat logging of the
/// same name across passes.
pub fn scan_root(
    root: &Path,
    folder_lookup: &HashMap<String, String>,
    seen_unknown: &mut HashSet<String>,
) -> Result<Vec<SourceBatch>> {
    let mut batches = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let folder_name = entry.file_name().to_string_lossy().to_string();
        let Some(source_id) = folder_lookup.get(&folder_name) else {
            if seen_unknown.insert(folder_name.clone()) {
                debug!(folder = %folder_name, "skipping unknown source folder");
            }
            continue;
        };

        let import_dir = entry.path().join("import");
        if !import_dir.is_dir() {
            continue;
        }

        let candidates = find_ready_pairs(&import_dir)?;
        if !candidates.is_empty() {
            batches.push(SourceBatch {
                source_id: source_id.clone(),
                folder_name,
                candidates,
            });
        }
    }

    // Deterministic processing order across passes
    batches.sort_by(|a, b| a.folder_name.cmp(&b.folder_name));
    Ok(batches)
}

/// Find every `.puz` file whose `.meta.json` sibling is present.
pub fn find_ready_pairs(import_dir: &Path) -> Result<Vec<ImportCandidate>> {
    let mut ready = Vec::new();

    for entry in std::fs::read_dir(import_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(PUZ_EXTENSION) {
            continue;
        }

        let meta_path = path.with_extension("meta.json");
        if meta_path.is_file() {
            ready.push(ImportCandidate {
                puz_path: path,
                meta_path,
            });
        }
    }

    ready.sort_by(|a, b| a.puz_path.cmp(&b.puz_path));
    Ok(ready)
}
