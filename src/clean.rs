//! Top-level entry points: run the whole cleaning pipeline.
//!
//! [`run`] goes from a PDF (path or URL) plus the two spreadsheets to the
//! final enriched table. [`clean_tables`] starts one step later, from raw
//! cell matrices, so it works without pdfium; tests and callers with their
//! own extraction use it directly.

use crate::config::{LayoutConfig, PageSelection, PipelineConfig};
use crate::error::{CleanError, RowIssue};
use crate::output::{self, CountMismatch, InspectReport, PipelineOutput, PipelineStats};
use crate::pipeline::catalog::{attach_catalog, read_catalog};
use crate::pipeline::layout::RawTable;
use crate::pipeline::lookup::{self, GeneLookup, MyGeneClient};
use crate::pipeline::{enrich, extract, input, merge, normalize, reconcile};
use crate::progress::Stage;
use crate::records::{Direction, RecordSource};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The files one run reads.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// Manuscript PDF, local path or HTTP(S) URL.
    pub pdf: String,
    /// Supplementary full-results spreadsheet (CSV or TSV).
    pub supplement: PathBuf,
    /// VDRC stock catalog (CSV or TSV). Without it, supplement-only lines
    /// have no CG number.
    pub catalog: Option<PathBuf>,
}

impl PipelineInputs {
    pub fn new(pdf: impl Into<String>, supplement: impl Into<PathBuf>) -> Self {
        Self {
            pdf: pdf.into(),
            supplement: supplement.into(),
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: impl Into<PathBuf>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }
}

/// Run the full pipeline.
///
/// # Returns
/// `Ok(PipelineOutput)` even when rows were dropped or overridden; those are
/// listed in `output.issues`.
///
/// # Errors
/// Returns `Err(CleanError)` only for fatal errors:
/// - an input file is missing, unreadable, or not the expected format
/// - a table's page selection matches no page of the document
/// - nothing parsed from either table, or the supplement is empty
/// - every lookup batch failed
pub async fn run(
    inputs: &PipelineInputs,
    config: &PipelineConfig,
) -> Result<PipelineOutput, CleanError> {
    pipeline_start(config);
    let output = run_stages(inputs, config).await?;
    pipeline_complete(config, &output);
    Ok(output)
}

async fn run_stages(
    inputs: &PipelineInputs,
    config: &PipelineConfig,
) -> Result<PipelineOutput, CleanError> {
    let total_start = Instant::now();
    info!("Starting run: {}", inputs.pdf);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(&inputs.pdf, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 2: Page selection ───────────────────────────────────────────
    let metadata = extract::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    let increased_idx = page_indices(config, Direction::Increased, total_pages)?;
    let decreased_idx = page_indices(config, Direction::Decreased, total_pages)?;

    // ── Step 3: Extract ──────────────────────────────────────────────────
    stage_start(config, Stage::Extract);
    let extract_start = Instant::now();
    let pwd = config.password.as_deref();
    let increased =
        extract::extract_tables(&pdf_path, pwd, &increased_idx, config.layout).await?;
    let decreased =
        extract::extract_tables(&pdf_path, pwd, &decreased_idx, config.layout).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    let raw_rows: usize = increased
        .iter()
        .chain(&decreased)
        .map(|t| t.rows.len())
        .sum();
    info!(
        "Extracted {} raw rows from {} pages in {}ms",
        raw_rows,
        increased.len() + decreased.len(),
        extract_duration_ms
    );
    stage_complete(config, Stage::Extract, raw_rows);

    // ── Step 4..: everything after extraction ────────────────────────────
    let mut out = clean_stages(
        increased,
        decreased,
        &inputs.supplement,
        inputs.catalog.as_deref(),
        config,
    )
    .await?;
    out.stats.extract_duration_ms = extract_duration_ms;
    out.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(out)
}

/// Run the pipeline from already-extracted cell matrices.
pub async fn clean_tables(
    increased: Vec<RawTable>,
    decreased: Vec<RawTable>,
    supplement: &Path,
    catalog: Option<&Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, CleanError> {
    pipeline_start(config);
    let output = clean_stages(increased, decreased, supplement, catalog, config).await?;
    pipeline_complete(config, &output);
    Ok(output)
}

async fn clean_stages(
    increased: Vec<RawTable>,
    decreased: Vec<RawTable>,
    supplement: &Path,
    catalog: Option<&Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, CleanError> {
    let start = Instant::now();
    let mut stats = PipelineStats::default();
    let mut issues: Vec<RowIssue> = Vec::new();

    // ── Normalize ────────────────────────────────────────────────────────
    stage_start(config, Stage::Normalize);
    let corrections = &config.corrections;
    let inc = normalize::normalize_tables(&increased, Direction::Increased, corrections);
    let dec = normalize::normalize_tables(&decreased, Direction::Decreased, corrections);

    stats.raw_rows = inc.raw_rows + dec.raw_rows;
    stats.noise_rows = inc.noise_rows + dec.noise_rows;
    stats.unparsed_rows = inc.issues.len() + dec.issues.len();
    stats.increased = inc.lines.len();
    stats.decreased = dec.lines.len();
    info!(
        "Normalized: {} increased, {} decreased, {} noise, {} unparsed",
        stats.increased, stats.decreased, stats.noise_rows, stats.unparsed_rows
    );
    issues.extend(inc.issues);
    issues.extend(dec.issues);

    check_count(&mut stats, "increased", config.expectations.increased, inc.lines.len());
    check_count(&mut stats, "decreased", config.expectations.decreased, dec.lines.len());
    dump(config, "increased.tsv", |buf| output::write_significant_tsv(&inc.lines, buf)).await?;
    dump(config, "decreased.tsv", |buf| output::write_significant_tsv(&dec.lines, buf)).await?;
    stage_complete(config, Stage::Normalize, stats.increased + stats.decreased);

    // ── Merge ────────────────────────────────────────────────────────────
    stage_start(config, Stage::Merge);
    let (significant, merge_issues) = merge::merge(inc.lines, dec.lines);
    issues.extend(merge_issues);
    if significant.is_empty() {
        return Err(CleanError::EmptyTable {
            stage: "significant".into(),
        });
    }
    stats.significant = significant.len();
    check_count(&mut stats, "significant", config.expectations.significant, significant.len());
    dump(config, "significant.tsv", |buf| output::write_significant_tsv(&significant, buf))
        .await?;
    stage_complete(config, Stage::Merge, significant.len());

    // ── Reconcile ────────────────────────────────────────────────────────
    stage_start(config, Stage::Reconcile);
    let (supplement_rows, supp_issues) =
        reconcile::read_supplement(supplement, &config.supplement_columns)?;
    issues.extend(supp_issues);
    if supplement_rows.is_empty() {
        return Err(CleanError::EmptyTable {
            stage: "supplement".into(),
        });
    }
    stats.supplement_rows = supplement_rows.len();

    let (reconciled, rec_issues) = reconcile::reconcile(significant, supplement_rows);
    issues.extend(rec_issues);
    stats.reconciled = reconciled.len();
    stats.manuscript_only = reconciled
        .iter()
        .filter(|r| r.source == RecordSource::ManuscriptOnly)
        .count();
    info!(
        "Reconciled {} lines ({} manuscript-only)",
        stats.reconciled, stats.manuscript_only
    );
    dump(config, "reconciled.tsv", |buf| output::write_reconciled_tsv(&reconciled, buf)).await?;
    stage_complete(config, Stage::Reconcile, reconciled.len());

    // ── Catalog ──────────────────────────────────────────────────────────
    stage_start(config, Stage::Catalog);
    let entries = match catalog {
        Some(path) => {
            let (entries, cat_issues) =
                read_catalog(path, &config.catalog_columns, corrections)?;
            issues.extend(cat_issues);
            entries
        }
        None => {
            debug!("No catalog given; CG numbers come from the manuscript only");
            Vec::new()
        }
    };
    stats.catalog_matched = {
        let known: HashSet<u32> = entries.iter().map(|e| e.vdrc_id).collect();
        reconciled.iter().filter(|r| known.contains(&r.vdrc_id)).count()
    };
    let (records, cat_issues) = attach_catalog(reconciled, &entries);
    issues.extend(cat_issues);
    stage_complete(config, Stage::Catalog, stats.catalog_matched);

    // ── Lookup ───────────────────────────────────────────────────────────
    let (records, unmapped) = if config.skip_lookup {
        info!("Gene lookup skipped");
        (records, Vec::new())
    } else {
        stage_start(config, Stage::Lookup);
        let lookup_start = Instant::now();
        let client = resolve_lookup(config)?;
        let queries = enrich::lookup_queries(&records);
        let outcome = lookup::lookup_all(&client, &queries, config).await?;
        stats.lookup_queries = outcome.queries;
        stats.lookup_hits = outcome.annotations.len();
        stats.lookup_duration_ms = lookup_start.elapsed().as_millis() as u64;
        issues.extend(outcome.issues);
        let enriched = enrich::enrich(records, &outcome.annotations);
        stage_complete(config, Stage::Lookup, stats.lookup_hits);
        enriched
    };
    stats.unmapped = unmapped.len();
    if !unmapped.is_empty() {
        warn!("{} identifiers had no lookup hit", unmapped.len());
    }

    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} records, {} issues, {}ms",
        records.len(),
        issues.len(),
        stats.total_duration_ms
    );

    Ok(PipelineOutput {
        records,
        unmapped_identifiers: unmapped,
        issues,
        stats,
    })
}

/// Run the pipeline and write the final table to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn run_to_file(
    inputs: &PipelineInputs,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, CleanError> {
    pipeline_start(config);
    let output = run_stages(inputs, config).await?;
    write_output(&output, output_path.as_ref(), config).await?;
    pipeline_complete(config, &output);
    Ok(output)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    inputs: &PipelineInputs,
    config: &PipelineConfig,
) -> Result<PipelineOutput, CleanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CleanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(inputs, config))
}

/// Show document metadata and the raw matrices of `pages`.
///
/// Does not read the spreadsheets or touch the network beyond a URL input,
/// which is downloaded within `download_timeout_secs`.
pub async fn inspect(
    pdf: impl AsRef<str>,
    pages: &PageSelection,
    password: Option<&str>,
    layout: LayoutConfig,
    download_timeout_secs: u64,
) -> Result<InspectReport, CleanError> {
    let resolved = input::resolve_input(pdf.as_ref(), download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let metadata = extract::extract_metadata(&pdf_path, password).await?;
    let indices = pages.to_indices(metadata.page_count);
    let tables = extract::extract_tables(&pdf_path, password, &indices, layout).await?;
    Ok(InspectReport { metadata, tables })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Write stage of [`run_to_file`].
async fn write_output(
    output: &PipelineOutput,
    path: &Path,
    config: &PipelineConfig,
) -> Result<(), CleanError> {
    stage_start(config, Stage::Write);
    let mut buf = Vec::new();
    output::write_tsv(&output.records, &mut buf)?;
    output::write_file_atomic(path, buf).await?;
    info!("Wrote {} rows to {}", output.records.len(), path.display());
    stage_complete(config, Stage::Write, output.records.len());
    Ok(())
}

fn page_indices(
    config: &PipelineConfig,
    direction: Direction,
    total_pages: usize,
) -> Result<Vec<usize>, CleanError> {
    let selection = config.pages_for(direction);
    let skipped = selection.out_of_range(total_pages);
    if !skipped.is_empty() {
        warn!(
            "{} table: skipping pages {:?} (out of range, total={})",
            direction, skipped, total_pages
        );
    }
    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(CleanError::PageOutOfRange {
            table: direction.table_name().to_string(),
            total: total_pages,
        });
    }
    debug!("{} table: pages {:?}", direction, indices);
    Ok(indices)
}

/// Pre-built lookup first, otherwise an HTTP client for `lookup_url`.
fn resolve_lookup(config: &PipelineConfig) -> Result<Arc<dyn GeneLookup>, CleanError> {
    if let Some(ref lookup) = config.lookup {
        return Ok(Arc::clone(lookup));
    }
    Ok(Arc::new(MyGeneClient::from_config(config)?))
}

fn check_count(stats: &mut PipelineStats, table: &str, expected: Option<usize>, actual: usize) {
    let Some(expected) = expected else {
        return;
    };
    if expected != actual {
        warn!(
            "{} table: expected {} lines, parsed {}",
            table, expected, actual
        );
        stats.count_mismatches.push(CountMismatch {
            table: table.to_string(),
            expected,
            actual,
        });
    }
}

async fn dump<F>(config: &PipelineConfig, name: &str, write: F) -> Result<(), CleanError>
where
    F: FnOnce(&mut Vec<u8>) -> Result<(), CleanError>,
{
    let Some(ref dir) = config.dump_dir else {
        return Ok(());
    };
    let mut buf = Vec::new();
    write(&mut buf)?;
    let path = dir.join(name);
    output::write_file_atomic(&path, buf).await?;
    debug!("Dumped {}", path.display());
    Ok(())
}

fn pipeline_start(config: &PipelineConfig) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_start();
    }
}

fn pipeline_complete(config: &PipelineConfig, output: &PipelineOutput) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(output.records.len(), output.issues.len());
    }
}

fn stage_start(config: &PipelineConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_complete(config: &PipelineConfig, stage: Stage, rows: usize) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, rows);
    }
}
