//! Layout: turn positioned text spans into a raw cell matrix.
//!
//! pdfium gives us runs of text with bounding boxes and nothing else. A table
//! row is a set of spans whose vertical centres line up; a cell is a group of
//! horizontally adjacent spans. Column counts are not reconciled here; pages
//! of the same table routinely disagree and the normalizer works on tokens.

use crate::config::LayoutConfig;
use serde::{Deserialize, Serialize};

/// One run of text on a page, in PDF user-space points (origin bottom-left).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub text: String,
}

impl TextSpan {
    pub fn new(left: f32, right: f32, top: f32, bottom: f32, text: impl Into<String>) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
            text: text.into(),
        }
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Untyped grid of cell text from one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// 1-indexed page number.
    pub page: usize,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(page: usize, rows: Vec<Vec<String>>) -> Self {
        Self { page, rows }
    }

    /// Widest row, for eyeballing how ragged a page is.
    pub fn max_columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Render the matrix as tab-separated lines.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }
}

/// Gap below which two spans are glued without a space.
const TOUCHING_GAP: f32 = 0.5;

/// Group spans into rows (top to bottom) of cells (left to right).
pub fn spans_to_rows(spans: &[TextSpan], layout: &LayoutConfig) -> Vec<Vec<String>> {
    let mut spans: Vec<&TextSpan> = spans.iter().filter(|s| !s.text.trim().is_empty()).collect();
    // PDF y grows upwards, so the top of the page has the largest centre.
    spans.sort_by(|a, b| b.center_y().total_cmp(&a.center_y()));

    let mut lines: Vec<Vec<&TextSpan>> = Vec::new();
    let mut anchor = f32::NAN;
    for span in spans {
        let c = span.center_y();
        match lines.last_mut() {
            Some(line) if (anchor - c).abs() <= layout.line_tolerance => {
                line.push(span);
                // running mean keeps slightly skewed rows together
                anchor += (c - anchor) / line.len() as f32;
            }
            _ => {
                lines.push(vec![span]);
                anchor = c;
            }
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.left.total_cmp(&b.left));
            line_to_cells(&line, layout.cell_gap)
        })
        .collect()
}

fn line_to_cells(line: &[&TextSpan], cell_gap: f32) -> Vec<String> {
    let mut cells: Vec<String> = Vec::new();
    let mut prev_right = f32::NEG_INFINITY;
    for span in line {
        let gap = span.left - prev_right;
        let text = span.text.trim();
        match cells.last_mut() {
            Some(cell) if gap < cell_gap => {
                if gap > TOUCHING_GAP {
                    cell.push(' ');
                }
                cell.push_str(text);
            }
            _ => cells.push(text.to_string()),
        }
        prev_right = prev_right.max(span.right);
    }
    cells
}
