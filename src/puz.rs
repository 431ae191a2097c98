//! Reader for the AcrossLite `.puz` binary format.
//!
//! Parses just enough of the format for import validation, metadata
//! extraction, and preview rendering: the fixed 52-byte header, the
//! solution and player grids, and the NUL-terminated ISO-8859-1 string
//! section (title, author, copyright, clues, notes). Checksums are not
//! verified; structural validity is what gates an import.

use std::path::Path;
use thiserror::Error;

/// Magic string at offset 0x02.
const MAGIC: &[u8] = b"ACROSS&DOWN\0";

/// Fixed header length up to the start of the solution grid.
const HEADER_LEN: usize = 0x34;

const WIDTH_OFFSET: usize = 0x2C;
const HEIGHT_OFFSET: usize = 0x2D;
const NUM_CLUES_OFFSET: usize = 0x2E;

#[derive(Debug, Error)]
pub enum PuzError {
    #[error("file too short to be a .puz file ({0} bytes)")]
    TooShort(usize),
    #[error("missing ACROSS&DOWN magic")]
    BadMagic,
    #[error("grid dimensions {width}x{height} exceed file size")]
    TruncatedGrid { width: u8, height: u8 },
    #[error("string section truncated (expected {expected} strings, found {found})")]
    TruncatedStrings { expected: usize, found: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A parsed crossword file.
#[derive(Debug, Clone)]
pub struct PuzFile {
    pub width: u8,
    pub height: u8,
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub clues: Vec<String>,
    pub notes: String,
    /// Solution grid, row-major; `.` marks a black cell.
    solution: Vec<u8>,
}

impl PuzFile {
    pub fn read(path: &Path) -> Result<PuzFile, PuzError> {
        let bytes = std::fs::read(path)?;
        PuzFile::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<PuzFile, PuzError> {
        if bytes.len() < HEADER_LEN {
            return Err(PuzError::TooShort(bytes.len()));
        }
        if &bytes[0x02..0x02 + MAGIC.len()] != MAGIC {
            return Err(PuzError::BadMagic);
        }

        let width = bytes[WIDTH_OFFSET];
        let height = bytes[HEIGHT_OFFSET];
        let num_clues =
            u16::from_le_bytes([bytes[NUM_CLUES_OFFSET], bytes[NUM_CLUES_OFFSET + 1]]) as usize;

        let cells = width as usize * height as usize;
        // Solution grid followed by the player-state grid.
        let strings_start = HEADER_LEN + cells * 2;
        if bytes.len() < strings_start {
            return Err(PuzError::TruncatedGrid { width, height });
        }

        let solution = bytes[HEADER_LEN..HEADER_LEN + cells].to_vec();

        // Title, author, copyright, one string per clue, then notes.
        let expected = 4 + num_clues;
        let mut strings = read_nul_strings(&bytes[strings_start..], expected);
        if strings.len() < expected {
            return Err(PuzError::TruncatedStrings {
                expected,
                found: strings.len(),
            });
        }

        let notes = strings.pop().unwrap_or_default();
        let clues = strings.split_off(3);
        let copyright = strings.pop().unwrap_or_default();
        let author = strings.pop().unwrap_or_default();
        let title = strings.pop().unwrap_or_default();

        Ok(PuzFile {
            width,
            height,
            title,
            author,
            copyright,
            clues,
            notes,
            solution,
        })
    }

    /// Whether the cell at (row, col) is a black square.
    pub fn is_black(&self, row: usize, col: usize) -> bool {
        self.solution
            .get(row * self.width as usize + col)
            .map(|&b| b == b'.')
            .unwrap_or(true)
    }

    /// Title with surrounding whitespace stripped, None when blank.
    pub fn title_opt(&self) -> Option<&str> {
        let t = self.title.trim();
        (!t.is_empty()).then_some(t)
    }

    pub fn author_opt(&self) -> Option<&str> {
        let a = self.author.trim();
        (!a.is_empty()).then_some(a)
    }
}

/// Read up to `max` NUL-terminated ISO-8859-1 strings.
fn read_nul_strings(bytes: &[u8], max: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(max);
    let mut rest = bytes;
    while out.len() < max {
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                out.push(latin1_to_string(&rest[..end]));
                rest = &rest[end + 1..];
            }
            None => break,
        }
    }
    out
}

/// ISO-8859-1 maps each byte to the same Unicode code point.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
