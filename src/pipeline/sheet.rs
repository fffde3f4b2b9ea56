//! Shared CSV/TSV machinery for the supplement and the stock catalog.
//!
//! Both inputs are hand-maintained spreadsheets exported by different people,
//! so headers are matched against a list of aliases and every cell goes
//! through the same cleanup as the PDF text.

use super::input::check_readable;
use super::normalize::clean_cell;
use crate::error::CleanError;
use crate::records::Flag;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

// Two-digit years first: `%Y` would read "12" as year 12.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

/// An opened spreadsheet with its header row.
pub(crate) struct Sheet {
    path: PathBuf,
    headers: StringRecord,
    reader: csv::Reader<File>,
}

impl Sheet {
    /// Open `path`; `.tsv` and `.txt` are tab-delimited, anything else is CSV.
    pub(crate) fn open(path: &Path) -> Result<Self, CleanError> {
        let file = check_readable(path)?;
        let delimiter = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") | Some("txt") => b'\t',
            _ => b',',
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers = reader
            .headers()
            .map_err(|e| table_read(path, e))?
            .clone();
        debug!("{}: {} columns", path.display(), headers.len());

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            reader,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Short name for issue reports.
    pub(crate) fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Index of the first header matching any alias, case-insensitively.
    pub(crate) fn column(&self, aliases: &[String]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let alias = alias.trim();
            self.headers
                .iter()
                .position(|h| clean_cell(h).eq_ignore_ascii_case(alias))
        })
    }

    /// Like [`Sheet::column`], but a missing column is fatal.
    pub(crate) fn required_column(
        &self,
        column: &str,
        aliases: &[String],
    ) -> Result<usize, CleanError> {
        self.column(aliases).ok_or_else(|| CleanError::MissingColumn {
            path: self.path.clone(),
            column: column.to_string(),
            accepted: aliases.join(", "),
        })
    }

    /// Data rows with their 1-indexed line number (the header is line 1).
    pub(crate) fn rows(
        &mut self,
    ) -> impl Iterator<Item = Result<(usize, StringRecord), CleanError>> + '_ {
        let path = self.path.clone();
        self.reader
            .records()
            .enumerate()
            .map(move |(i, r)| r.map(|rec| (i + 2, rec)).map_err(|e| table_read(&path, e)))
    }
}

fn table_read(path: &Path, source: csv::Error) -> CleanError {
    CleanError::TableRead {
        path: path.to_path_buf(),
        source,
    }
}

/// Cleaned cell text, `None` when the column is absent or the cell is blank.
pub(crate) fn cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    let text = clean_cell(record.get(idx?)?);
    (!text.is_empty()).then_some(text)
}

/// Parse a VDRC ID. Spreadsheet exports sometimes render integers as `104563.0`.
pub fn parse_vdrc_id(s: &str) -> Option<u32> {
    let s = s.trim();
    let s = s.strip_suffix(".0").unwrap_or(s);
    s.parse().ok()
}

pub fn parse_number(s: &str) -> Option<f64> {
    clean_cell(s).parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a `+`/`-` flag, also accepting the spelled-out yes/no forms.
pub fn parse_flag(s: &str) -> Option<Flag> {
    let cleaned = clean_cell(s);
    Flag::from_token(&cleaned).or_else(|| match cleaned.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Some(Flag::Plus),
        "no" | "n" | "false" => Some(Flag::Minus),
        _ => None,
    })
}

/// Parse a date in any of the accepted layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
