//! Empty-grid SVG preview rendering.
//!
//! Deterministic: the same `.puz` bytes always produce the same SVG.
//! Preview generation is best-effort everywhere it is called; a missing
//! preview never blocks ingestion.

use anyhow::{bail, Result};
use std::fmt::Write as _;
use std::path::Path;

use crate::puz::PuzFile;

const MAX_SIZE: f64 = 500.0;

/// Render an empty grid preview of `puz_path` to `output_path`.
pub fn generate_preview(puz_path: &Path, output_path: &Path) -> Result<()> {
    let puzzle = PuzFile::read(puz_path)?;
    let svg = render_svg(&puzzle)?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, svg)?;
    Ok(())
}

fn render_svg(puzzle: &PuzFile) -> Result<String> {
    let width = puzzle.width as f64;
    let height = puzzle.height as f64;
    if width == 0.0 || height == 0.0 {
        bail!("cannot render preview for a {}x{} grid", puzzle.width, puzzle.height);
    }

    let cell = round2(MAX_SIZE / width.max(height));
    let svg_w = round2(width * cell);
    let svg_h = round2(height * cell);

    let mut svg = String::new();
    svg.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {svg_w} {svg_h}" width="{svg_w}" height="{svg_h}">"#
    )?;
    write!(svg, r#"<rect width="{svg_w}" height="{svg_h}" fill="white"/>"#)?;

    for row in 0..puzzle.height as usize {
        for col in 0..puzzle.width as usize {
            let x = round2(col as f64 * cell);
            let y = round2(row as f64 * cell);
            if puzzle.is_black(row, col) {
                write!(
                    svg,
                    r#"<rect x="{x}" y="{y}" width="{cell}" height="{cell}" fill="black"/>"#
                )?;
            } else {
                write!(
                    svg,
                    r#"<rect x="{x}" y="{y}" width="{cell}" height="{cell}" fill="white" stroke="black" stroke-width="1"/>"#
                )?;
            }
        }
    }

    svg.push_str("</svg>");
    Ok(svg)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
