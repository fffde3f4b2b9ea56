//! # memscreen
//!
//! Clean the data of a published Drosophila RNAi memory screen into one
//! tab-separated table.
//!
//! The paper prints its significant lines as two PDF tables (increased and
//! decreased memory) that break across pages, mix header furniture into the
//! text layer, glue `PI ± SEM` into one cell and misprint a few identifiers.
//! The full screen lives in a supplement spreadsheet with repeated keys. This
//! crate scrapes the tables, reconciles them with the supplement, resolves
//! each line's CG number through the VDRC stock catalog and attaches stable
//! gene identifiers from a batch lookup service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    text spans of fixed page ranges via pdfium (spawn_blocking)
//!  ├─ 3. Normalize  cell cleanup, noise filter, typed records
//!  ├─ 4. Merge      increased ∪ decreased, unique by VDRC ID
//!  ├─ 5. Reconcile  join the supplement, manuscript values win
//!  ├─ 6. Enrich     catalog CG numbers + gene symbol / FlyBase / Entrez
//!  └─ 7. Output     TSV + per-stage stats and non-fatal issues
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memscreen::{run, PageSelection, PipelineConfig, PipelineInputs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .increased_pages(PageSelection::Single(5))
//!         .decreased_pages(PageSelection::Range(6, 9))
//!         .build()?;
//!     let inputs = PipelineInputs::new("paper.pdf", "supplement.csv")
//!         .with_catalog("vdrc_catalog.tsv");
//!     let output = run(&inputs, &config).await?;
//!     print!("{}", output.to_tsv()?);
//!     eprintln!("{} issues", output.issues.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `memscreen` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! memscreen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clean;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod records;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use clean::{clean_tables, inspect, run, run_sync, run_to_file, PipelineInputs};
pub use config::{
    CatalogColumns, CountExpectations, IdentifierCorrections, LayoutConfig, PageSelection,
    PipelineConfig, PipelineConfigBuilder, SupplementColumns,
};
pub use error::{CleanError, RowIssue};
pub use output::{
    write_tsv, CountMismatch, DocumentMetadata, InspectReport, PipelineOutput, PipelineStats,
};
pub use pipeline::layout::RawTable;
pub use pipeline::lookup::{GeneLookup, MyGeneClient};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use records::{
    CatalogEntry, Direction, EnrichedRecord, Flag, GeneAnnotation, RecordSource,
    ReconciledRecord, SignificantLine, SupplementRecord,
};
