//! Failure quarantine.
//!
//! Moves whatever remains of a failed candidate into the source's
//! `errors/` directory under a timestamp-suffixed name, alongside a
//! plain-text diagnostic. Quarantine itself never fails the caller; a
//! broken quarantine is logged and swallowed so one bad candidate can
//! never take down a batch.

use chrono::Utc;
use std::path::Path;
use tracing::{error, warn};

use crate::models::ImportCandidate;

/// Relocate a failed candidate into `<source_dir>/errors/`.
///
/// Either half of the pair may already be gone (a crash mid-move, for
/// instance); each is moved independently if it still exists.
pub fn quarantine(source_dir: &Path, candidate: &ImportCandidate, error_msg: &str) {
    if let Err(e) = try_quarantine(source_dir, candidate, error_msg) {
        warn!(
            puz = %candidate.puz_path.display(),
            "failed to quarantine candidate: {e}"
        );
    }
}

fn try_quarantine(
    source_dir: &Path,
    candidate: &ImportCandidate,
    error_msg: &str,
) -> std::io::Result<()> {
    let errors_dir = source_dir.join("errors");
    std::fs::create_dir_all(&errors_dir)?;

    let base = candidate
        .puz_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");

    let dest_puz = errors_dir.join(format!("{base}_{timestamp}.puz"));
    let dest_meta = errors_dir.join(format!("{base}_{timestamp}.meta.json"));
    let error_file = errors_dir.join(format!("{base}_{timestamp}.error.txt"));

    move_if_exists(&candidate.puz_path, &dest_puz)?;
    move_if_exists(&candidate.meta_path, &dest_meta)?;
    std::fs::write(&error_file, error_msg)?;

    error!(
        errors_dir = %errors_dir.display(),
        base = %base,
        "quarantined failed import: {error_msg}"
    );
    Ok(())
}

fn move_if_exists(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.exists() {
        std::fs::rename(from, to)?;
    }
    Ok(())
}
