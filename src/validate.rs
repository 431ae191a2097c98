//! Candidate validation and metadata extraction.
//!
//! The sidecar must carry an ISO `puzzle_date`; title and author fall
//! back to whatever the `.puz` file itself declares, and finally to a
//! literal default title. A primary file that the `.puz` reader rejects
//! fails validation outright.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ImportError;
use crate::models::ImportCandidate;
use crate::puz::PuzFile;

pub const DEFAULT_TITLE: &str = "Untitled";

/// Sidecar shape: `<base>.meta.json`.
#[derive(Debug, Deserialize)]
struct Sidecar {
    puzzle_date: Option<String>,
    title: Option<String>,
    author: Option<String>,
}

/// Everything the catalog writer needs from a validated candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImport {
    pub title: String,
    pub author: Option<String>,
    pub puzzle_date: NaiveDate,
}

pub fn validate(candidate: &ImportCandidate) -> Result<ValidatedImport, ImportError> {
    let raw = std::fs::read_to_string(&candidate.meta_path)?;
    let sidecar: Sidecar = serde_json::from_str(&raw)
        .map_err(|e| ImportError::validation(format!("invalid metadata sidecar: {e}")))?;

    let date_str = sidecar
        .puzzle_date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ImportError::validation("missing required field: puzzle_date"))?;

    let puzzle_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
        ImportError::validation(format!("invalid puzzle_date '{date_str}': {e}"))
    })?;

    let puz = PuzFile::read(&candidate.puz_path)?;

    let title = sidecar
        .title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| puz.title_opt())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    let author = sidecar
        .author
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| puz.author_opt())
        .map(str::to_string);

    Ok(ValidatedImport {
        title,
        author,
        puzzle_date,
    })
}
