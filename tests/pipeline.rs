//! Pipeline integration tests.
//!
//! These start from raw cell matrices, the shape pdfium extraction produces,
//! so they need neither a PDF nor libpdfium. The gene lookup is an in-memory
//! table and the spreadsheets are written to a temp dir per test.

use async_trait::async_trait;
use memscreen::{
    clean_tables, CleanError, CountExpectations, Direction, Flag, GeneAnnotation, GeneLookup,
    IdentifierCorrections, PageSelection, PipelineConfig, PipelineProgressCallback, RawTable,
    RecordSource, RowIssue, Stage,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn table(page: usize, rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        page,
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

/// Two pages of the increased table, with the furniture a real scrape picks up.
fn increased_tables() -> Vec<RawTable> {
    vec![
        table(
            5,
            &[
                &["Table 1", "Lines that increased memory"],
                &["VDRC ID", "CG number", "Primary PI ± SEM", "Secondary PI ± SEM"],
                &["104563", "CG 1234", "0.82 ± 0.03", "0.79 ± 0.02", "-", "+"],
                &["2001", "CG2OO1", "0.71 Â± 0.04", "0.69 ± 0.05", "+", "\u{2212}0.8", "-", "+"],
                &["1335"],
            ],
        ),
        table(
            6,
            &[
                &["Table 1 (continued)"],
                &["5005", "CG5005", "0.77 ±", "0.06"],
                &["0.74 ± 0.03", "-", "+"],
                &["a Physical abnormality observed in the line"],
            ],
        ),
    ]
}

fn decreased_tables() -> Vec<RawTable> {
    vec![table(
        7,
        &[
            &["Table 2", "Lines that decreased memory"],
            &["3003", "CG3003", "0.21 ± 0.05", "0.25 ± 0.04", "-", "\u{2193}"],
            &["4004", "CG4004", "0.18 ± 0.03", "0.22 ± 0.02", "+", "-"],
            &["?? garbled line from a figure"],
            // also printed in the increased table
            &["2001", "CG2001", "0.30 ± 0.05", "0.28 ± 0.04", "-", "-"],
        ],
    )]
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn supplement(dir: &Path) -> PathBuf {
    write(
        dir,
        "supplement.csv",
        "VDRC ID,PI,SEM,Date,Physical abnormality\n\
         104563,0.80,0.05,2012-03-01,-\n\
         104563,0.40,0.06,2012-04-01,-\n\
         2001,0.70,0.04,3/7/12,+\n\
         3003,0.22,0.05,2012-05-02,-\n\
         4004,0.19,0.03,2012-05-03,+\n\
         7007,0.50,0.04,2012-06-01,-\n\
         7007,0.52,0.05,2012-06-02,-\n\
         8008,0.49,0.03,,\n\
         bad,0.1,0.1,,\n",
    )
}

fn catalog(dir: &Path) -> PathBuf {
    write(
        dir,
        "vdrc_catalog.tsv",
        "Transformant ID\tCG Number\tLibrary\n\
         104563\tCG1234\tKK\n\
         2001\tCG2002\tGD\n\
         7007\tCG7007\tGD\n\
         8008\tCG8008\tGD\n",
    )
}

/// Lookup backed by a fixed table; records every batch it is asked.
struct TableLookup {
    genes: HashMap<&'static str, (&'static str, &'static str, u32)>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl TableLookup {
    fn new() -> Arc<Self> {
        let genes = HashMap::from([
            ("CG1234", ("rut", "FBgn0003301", 40296)),
            ("CG2002", ("dnc", "FBgn0000479", 31759)),
            ("CG3003", ("amn", "FBgn0000076", 31347)),
            ("CG7007", ("orb2", "FBgn0264307", 37993)),
        ]);
        Arc::new(Self {
            genes,
            batches: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl GeneLookup for TableLookup {
    async fn lookup(&self, ids: &[String]) -> Result<Vec<GeneAnnotation>, CleanError> {
        self.batches.lock().unwrap().push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.genes.get(id.as_str()).map(|(sym, fb, entrez)| GeneAnnotation {
                    query: id.clone(),
                    symbol: Some(sym.to_string()),
                    name: None,
                    flybase_id: Some(fb.to_string()),
                    entrez_id: Some(entrez.to_string()),
                })
            })
            .collect())
    }
}

struct FailingLookup;

#[async_trait]
impl GeneLookup for FailingLookup {
    async fn lookup(&self, _ids: &[String]) -> Result<Vec<GeneAnnotation>, CleanError> {
        Err(CleanError::LookupFailed {
            message: "HTTP 503".into(),
        })
    }
}

#[derive(Default)]
struct StageLog(Mutex<Vec<(Stage, usize)>>);

impl PipelineProgressCallback for StageLog {
    fn on_stage_complete(&self, stage: Stage, rows: usize) {
        self.0.lock().unwrap().push((stage, rows));
    }
}

/// Every callback, in arrival order.
#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

impl PipelineProgressCallback for EventLog {
    fn on_pipeline_start(&self) {
        self.push("start".into());
    }

    fn on_stage_start(&self, stage: Stage) {
        self.push(format!("{stage:?} start"));
    }

    fn on_stage_complete(&self, stage: Stage, _rows: usize) {
        self.push(format!("{stage:?} done"));
    }

    fn on_pipeline_complete(&self, records: usize, issues: usize) {
        self.push(format!("complete {records} {issues}"));
    }
}

fn has(issues: &[RowIssue], pred: impl Fn(&RowIssue) -> bool) -> bool {
    issues.iter().any(pred)
}

fn config_with(lookup: Arc<dyn GeneLookup>) -> memscreen::PipelineConfigBuilder {
    PipelineConfig::builder()
        .increased_pages(PageSelection::Range(5, 6))
        .decreased_pages(PageSelection::Single(7))
        .lookup(lookup)
        .batch_size(2)
        .retry_backoff_ms(1)
        .max_retries(1)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_from_raw_tables() {
    let dir = tempfile::tempdir().unwrap();
    let lookup = TableLookup::new();
    let stages = Arc::new(StageLog::default());
    let config = config_with(lookup.clone())
        .corrections(IdentifierCorrections::new().with("CG5005", "CG5006"))
        .expectations(CountExpectations {
            increased: Some(3),
            decreased: Some(4),
            significant: None,
        })
        .progress_callback(stages.clone())
        .build()
        .unwrap();

    let out = clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        Some(catalog(dir.path()).as_path()),
        &config,
    )
    .await
    .unwrap();

    // ── Normalize + merge ────────────────────────────────────────────────
    assert_eq!(out.stats.increased, 3);
    assert_eq!(out.stats.decreased, 3);
    assert_eq!(out.stats.significant, 5, "2001 is in both tables");
    assert_eq!(out.stats.unparsed_rows, 1);
    assert_eq!(out.stats.noise_rows, 6);
    assert_eq!(out.stats.count_mismatches.len(), 1);
    assert_eq!(out.stats.count_mismatches[0].table, "decreased");

    // ── Reconcile: unique, sorted, one row per key ───────────────────────
    let ids: Vec<u32> = out.records.iter().map(|r| r.vdrc_id()).collect();
    assert_eq!(ids, vec![2001, 3003, 4004, 5005, 7007, 8008, 104_563]);
    assert_eq!(out.stats.reconciled, 7);
    assert_eq!(out.stats.manuscript_only, 1);

    let by_id = |id: u32| out.records.iter().find(|r| r.vdrc_id() == id).unwrap();

    // Manuscript values win; duplicate supplement key resolved by closest PI.
    let rut = by_id(104_563);
    assert_eq!(rut.record.pi, 0.82);
    assert_eq!(rut.record.sem, 0.03);
    assert_eq!(
        rut.record.date,
        chrono::NaiveDate::from_ymd_opt(2012, 3, 1)
    );
    assert_eq!(rut.record.source, RecordSource::Both);
    assert_eq!(rut.gene_symbol.as_deref(), Some("rut"));
    assert_eq!(rut.flybase_id.as_deref(), Some("FBgn0003301"));
    assert_eq!(rut.entrez_id.as_deref(), Some("40296"));

    // First occurrence (increased) kept; catalog CG wins over the manuscript.
    let dnc = by_id(2001);
    let sig = dnc.record.significant.as_ref().unwrap();
    assert_eq!(sig.direction, Direction::Increased);
    assert_eq!(sig.mean_activity_difference, Some(-0.8));
    assert_eq!(sig.act_sig, Some(Flag::Minus));
    assert_eq!(dnc.cg_number.as_deref(), Some("CG2002"));
    assert_eq!(dnc.gene_symbol.as_deref(), Some("dnc"));

    // Arrow flag normalised, table direction kept.
    let amn = by_id(3003);
    assert_eq!(
        amn.record.significant.as_ref().unwrap().change_in_memory,
        Flag::Minus
    );

    // Record split across two rows, identifier corrected, not in the supplement.
    let split = by_id(5005);
    assert_eq!(split.record.source, RecordSource::ManuscriptOnly);
    assert_eq!(split.cg_number.as_deref(), Some("CG5006"));
    let s = split.record.significant.as_ref().unwrap();
    assert_eq!((s.primary_pi, s.primary_sem), (0.77, 0.06));
    assert_eq!((s.secondary_pi, s.secondary_sem), (0.74, 0.03));

    // Supplement-only: supplement values, first of the repeated rows.
    let orb = by_id(7007);
    assert_eq!(orb.record.source, RecordSource::SupplementOnly);
    assert_eq!(orb.record.pi, 0.50);
    assert!(orb.record.significant.is_none());
    assert_eq!(orb.gene_symbol.as_deref(), Some("orb2"));

    // ── Enrich ───────────────────────────────────────────────────────────
    assert_eq!(
        out.unmapped_identifiers,
        vec!["CG4004", "CG5006", "CG8008"]
    );
    let batches = lookup.batches.lock().unwrap();
    assert!(batches.iter().all(|b| b.len() <= 2));
    assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 7);

    // ── Issues ───────────────────────────────────────────────────────────
    let issues = &out.issues;
    assert!(has(issues, |i| matches!(i, RowIssue::DuplicateKey { stage, vdrc_id: 2001 } if stage == "merge")));
    assert!(has(issues, |i| matches!(i, RowIssue::DuplicateKey { stage, vdrc_id: 7007 } if stage == "reconcile")));
    assert!(has(issues, |i| matches!(i, RowIssue::CatalogMismatch { vdrc_id: 2001, .. })));
    assert!(has(issues, |i| matches!(i, RowIssue::Unparsed { table, .. } if table == "decreased")));
    assert!(has(issues, |i| matches!(i, RowIssue::Unparsed { table, .. } if table == "supplement.csv")));
    assert!(
        !has(issues, |i| matches!(i, RowIssue::DuplicateKey { vdrc_id: 104_563, .. })),
        "duplicates resolved against the manuscript are not issues"
    );

    // ── Progress ─────────────────────────────────────────────────────────
    let seen: Vec<Stage> = stages.0.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        seen,
        vec![
            Stage::Normalize,
            Stage::Merge,
            Stage::Reconcile,
            Stage::Catalog,
            Stage::Lookup
        ]
    );
}

#[tokio::test]
async fn output_tsv_matches_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(TableLookup::new()).build().unwrap();
    let out = clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        Some(catalog(dir.path()).as_path()),
        &config,
    )
    .await
    .unwrap();

    let tsv = out.to_tsv().unwrap();
    let mut lines = tsv.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(header.len(), 20);
    assert_eq!(header[0], "vdrc_id");
    assert_eq!(lines.count(), out.records.len());
}

#[tokio::test]
async fn skip_lookup_keeps_catalog_join() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .increased_pages(PageSelection::All)
        .decreased_pages(PageSelection::All)
        .skip_lookup(true)
        .build()
        .unwrap();

    let out = clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        Some(catalog(dir.path()).as_path()),
        &config,
    )
    .await
    .unwrap();

    assert!(out.unmapped_identifiers.is_empty());
    assert_eq!(out.stats.lookup_queries, 0);
    assert!(out.records.iter().all(|r| r.gene_symbol.is_none()));
    let rut = out.records.iter().find(|r| r.vdrc_id() == 104_563).unwrap();
    assert_eq!(rut.cg_number.as_deref(), Some("CG1234"));
}

#[tokio::test]
async fn without_catalog_supplement_only_lines_have_no_cg() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(TableLookup::new()).build().unwrap();
    let out = clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        None,
        &config,
    )
    .await
    .unwrap();

    let orb = out.records.iter().find(|r| r.vdrc_id() == 7007).unwrap();
    assert_eq!(orb.cg_number, None);
    let dnc = out.records.iter().find(|r| r.vdrc_id() == 2001).unwrap();
    assert_eq!(dnc.cg_number.as_deref(), Some("CG2001"));
    assert!(!out
        .issues
        .iter()
        .any(|i| matches!(i, RowIssue::CatalogMismatch { .. })));
}

#[tokio::test]
async fn all_lookup_batches_failing_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(Arc::new(FailingLookup)).build().unwrap();
    let err = clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        Some(catalog(dir.path()).as_path()),
        &config,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CleanError::AllBatchesFailed { .. }), "{err}");
}

#[tokio::test]
async fn missing_supplement_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(dir.path(), "supp.csv", "VDRC ID,Score\n104563,0.8\n");
    let config = config_with(TableLookup::new()).build().unwrap();
    let err = clean_tables(increased_tables(), decreased_tables(), &bad, None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CleanError::MissingColumn { .. }), "{err}");
}

#[tokio::test]
async fn nothing_parsed_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(TableLookup::new()).build().unwrap();
    let noise_only = vec![table(5, &[&["Table 1"], &["PI ± SEM"]])];
    let err = clean_tables(
        noise_only.clone(),
        noise_only,
        &supplement(dir.path()),
        None,
        &config,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CleanError::EmptyTable { ref stage } if stage == "significant"));
}

#[tokio::test]
async fn stage_dumps_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let dumps = dir.path().join("stages");
    let config = config_with(TableLookup::new())
        .dump_dir(&dumps)
        .build()
        .unwrap();
    clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        None,
        &config,
    )
    .await
    .unwrap();

    for name in ["increased.tsv", "decreased.tsv", "significant.tsv", "reconciled.tsv"] {
        let text = std::fs::read_to_string(dumps.join(name)).unwrap();
        assert!(text.starts_with("vdrc_id\t"), "{name}: {text}");
    }
    let significant = std::fs::read_to_string(dumps.join("significant.tsv")).unwrap();
    assert_eq!(significant.lines().count(), 1 + 5);
}

#[test]
fn sync_callers_can_drive_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(TableLookup::new()).build().unwrap();
    let supp = supplement(dir.path());
    let out = tokio_test::block_on(clean_tables(
        increased_tables(),
        decreased_tables(),
        &supp,
        None,
        &config,
    ))
    .unwrap();
    assert_eq!(out.stats.significant, 5);
}

#[tokio::test]
async fn pipeline_events_bracket_the_stages() {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventLog::default());
    let config = config_with(TableLookup::new())
        .skip_lookup(true)
        .progress_callback(events.clone())
        .build()
        .unwrap();

    let out = clean_tables(
        increased_tables(),
        decreased_tables(),
        &supplement(dir.path()),
        None,
        &config,
    )
    .await
    .unwrap();

    let log = events.0.lock().unwrap().clone();
    assert_eq!(log.first().map(String::as_str), Some("start"));
    assert_eq!(
        log.last(),
        Some(&format!("complete {} {}", out.records.len(), out.issues.len()))
    );
    assert_eq!(log.iter().filter(|e| *e == "start").count(), 1);
    assert_eq!(log.iter().filter(|e| e.starts_with("complete")).count(), 1);
    assert!(log.contains(&"Catalog done".to_string()));
}
