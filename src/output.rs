//! Output types and the TSV writer.

use crate::error::{CleanError, RowIssue};
use crate::pipeline::layout::RawTable;
use crate::records::{EnrichedRecord, ReconciledRecord, SignificantLine};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Basic facts about the source PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// What `inspect` returns: metadata plus the raw matrices of the chosen pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub metadata: DocumentMetadata,
    pub tables: Vec<RawTable>,
}

/// A published count that the scrape did not reproduce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountMismatch {
    pub table: String,
    pub expected: usize,
    pub actual: usize,
}

/// Per-stage counts and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub raw_rows: usize,
    pub noise_rows: usize,
    pub unparsed_rows: usize,
    pub increased: usize,
    pub decreased: usize,
    pub significant: usize,
    pub supplement_rows: usize,
    pub reconciled: usize,
    pub manuscript_only: usize,
    pub catalog_matched: usize,
    pub lookup_queries: usize,
    pub lookup_hits: usize,
    pub unmapped: usize,
    pub extract_duration_ms: u64,
    pub lookup_duration_ms: u64,
    pub total_duration_ms: u64,
    pub count_mismatches: Vec<CountMismatch>,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Final table, sorted by `vdrc_id`, one row per line.
    pub records: Vec<EnrichedRecord>,
    /// Identifiers the lookup could not resolve.
    pub unmapped_identifiers: Vec<String>,
    pub issues: Vec<RowIssue>,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    /// Render the final table as TSV text.
    pub fn to_tsv(&self) -> Result<String, CleanError> {
        let mut buf = Vec::new();
        write_tsv(&self.records, &mut buf)?;
        String::from_utf8(buf).map_err(|e| CleanError::Internal(e.to_string()))
    }
}

/// One flat output row. Field order is the column order.
#[derive(Debug, Serialize)]
struct TsvRow<'a> {
    vdrc_id: u32,
    cg_number: Option<&'a str>,
    gene_symbol: Option<&'a str>,
    gene_name: Option<&'a str>,
    flybase_id: Option<&'a str>,
    entrez_id: Option<&'a str>,
    pi: f64,
    sem: f64,
    date: Option<String>,
    physical_abnormality: Option<&'static str>,
    significant: bool,
    direction: Option<&'static str>,
    primary_pi: Option<f64>,
    primary_sem: Option<f64>,
    secondary_pi: Option<f64>,
    secondary_sem: Option<f64>,
    mean_activity_difference: Option<f64>,
    act_sig: Option<&'static str>,
    change_in_memory: Option<&'static str>,
    source: &'static str,
}

impl<'a> TsvRow<'a> {
    fn from_reconciled(r: &'a ReconciledRecord) -> Self {
        let sig = r.significant.as_ref();
        Self {
            vdrc_id: r.vdrc_id,
            cg_number: sig.map(|s| s.cg_number.as_str()),
            gene_symbol: None,
            gene_name: None,
            flybase_id: None,
            entrez_id: None,
            pi: r.pi,
            sem: r.sem,
            date: r.date.map(|d| d.format("%Y-%m-%d").to_string()),
            physical_abnormality: r.physical_abnormality.map(|f| f.as_str()),
            significant: sig.is_some(),
            direction: sig.map(|s| s.direction.table_name()),
            primary_pi: sig.map(|s| s.primary_pi),
            primary_sem: sig.map(|s| s.primary_sem),
            secondary_pi: sig.map(|s| s.secondary_pi),
            secondary_sem: sig.map(|s| s.secondary_sem),
            mean_activity_difference: sig.and_then(|s| s.mean_activity_difference),
            act_sig: sig.and_then(|s| s.act_sig).map(|f| f.as_str()),
            change_in_memory: sig.map(|s| s.change_in_memory.as_str()),
            source: r.source.as_str(),
        }
    }

    fn from_enriched(e: &'a EnrichedRecord) -> Self {
        Self {
            cg_number: e.cg_number.as_deref(),
            gene_symbol: e.gene_symbol.as_deref(),
            gene_name: e.gene_name.as_deref(),
            flybase_id: e.flybase_id.as_deref(),
            entrez_id: e.entrez_id.as_deref(),
            ..Self::from_reconciled(&e.record)
        }
    }
}

fn tsv_writer<W: Write>(w: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(w)
}

fn csv_to_io(e: csv::Error) -> std::io::Error {
    std::io::Error::other(e)
}

/// Write the final table with a header row.
pub fn write_tsv<W: Write>(records: &[EnrichedRecord], w: W) -> Result<(), CleanError> {
    write_rows(records.iter().map(TsvRow::from_enriched), w)
}

/// Write reconciled (not yet enriched) records in the same column layout.
pub fn write_reconciled_tsv<W: Write>(
    records: &[ReconciledRecord],
    w: W,
) -> Result<(), CleanError> {
    write_rows(records.iter().map(TsvRow::from_reconciled), w)
}

/// Write significant lines as scraped, one column per field.
pub fn write_significant_tsv<W: Write>(
    lines: &[SignificantLine],
    w: W,
) -> Result<(), CleanError> {
    write_rows(lines.iter(), w)
}

fn write_rows<W: Write, T: Serialize>(
    rows: impl Iterator<Item = T>,
    w: W,
) -> Result<(), CleanError> {
    let mut writer = tsv_writer(w);
    let io_err = |e: std::io::Error| CleanError::OutputWriteFailed {
        path: "<writer>".into(),
        source: e,
    };
    for row in rows {
        writer.serialize(row).map_err(|e| io_err(csv_to_io(e)))?;
    }
    writer.flush().map_err(io_err)
}

/// Write a table to `path` atomically (temp file in the same directory, then rename).
pub async fn write_file_atomic(path: &Path, contents: Vec<u8>) -> Result<(), CleanError> {
    let failed = |e: std::io::Error| CleanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}
