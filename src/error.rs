//! Error types for the memscreen library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CleanError`] — **Fatal**: the run cannot proceed at all (missing
//!   input file, unreadable PDF, supplement without a `VDRC ID` column).
//!   Returned as `Err(CleanError)` from the top-level `run*` functions.
//!
//! * [`RowIssue`] — **Non-fatal**: a single row or lookup batch could not be
//!   used, but everything else is fine. Collected into
//!   [`crate::output::PipelineOutput::issues`] so the user can eyeball what
//!   was dropped or overridden after the run finishes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the memscreen library.
#[derive(Debug, Error)]
pub enum CleanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection for a table matched no page of the document.
    #[error("No page of the {table} selection is in range (document has {total} pages)")]
    PageOutOfRange { table: String, total: usize },

    /// pdfium returned an error while reading the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or install pdfium where the\n\
system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Spreadsheet errors ────────────────────────────────────────────────
    /// A CSV/TSV input could not be read.
    #[error("Failed to read table '{path}': {source}")]
    TableRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required column is absent from a CSV/TSV header.
    #[error("Table '{path}' has no '{column}' column (accepted headers: {accepted})")]
    MissingColumn {
        path: PathBuf,
        column: String,
        accepted: String,
    },

    /// A stage produced no rows at all; nothing downstream can work.
    #[error("The {stage} table is empty after cleaning")]
    EmptyTable { stage: String },

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// The gene lookup endpoint returned an error response.
    #[error("Gene lookup error: {message}")]
    LookupFailed { message: String },

    /// Every lookup batch failed after all retries.
    #[error("All {total} lookup batches failed after {retries} retries each.\nFirst error: {first_error}")]
    AllBatchesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem with one row, key, or lookup batch.
///
/// The pipeline keeps going; these are the things a human would otherwise
/// have found by eyeballing counts.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RowIssue {
    /// A non-noise line could not be parsed into a record.
    ///
    /// `page` is the PDF page for manuscript tables and the 1-indexed line
    /// number for spreadsheets.
    #[error("{table}:{page}: unparsed row '{raw}': {detail}")]
    Unparsed {
        table: String,
        page: usize,
        raw: String,
        detail: String,
    },

    /// A key appeared more than once; the first occurrence was kept.
    #[error("{stage}: duplicate VDRC ID {vdrc_id}, kept first occurrence")]
    DuplicateKey { stage: String, vdrc_id: u32 },

    /// The change-in-memory flag disagrees with the table the line came from.
    #[error("VDRC {vdrc_id}: change-in-memory flag '{flag}' contradicts the {table} table")]
    DirectionMismatch {
        vdrc_id: u32,
        flag: String,
        table: String,
    },

    /// The catalog and the manuscript name different CG numbers.
    #[error("VDRC {vdrc_id}: manuscript says {manuscript}, catalog says {catalog}; using catalog")]
    CatalogMismatch {
        vdrc_id: u32,
        manuscript: String,
        catalog: String,
    },

    /// A lookup batch failed after all retries.
    #[error("Lookup batch {batch}: failed after {retries} retries: {detail}")]
    BatchFailed {
        batch: usize,
        retries: u32,
        detail: String,
    },
}
