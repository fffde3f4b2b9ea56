//! Pipeline stages for cleaning the memory-screen tables.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; only [`extract`] needs pdfium and only [`lookup`] touches the network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ normalize ──▶ merge ──▶ reconcile ──▶ catalog ──▶ lookup ──▶ enrich
//! (path/URL) (pdfium)   (records)    (union)   (supplement)  (CG join)   (HTTP)    (annotate)
//! ```
//!
//! 1. [`input`]     canonicalise the user-supplied path or URL to a local PDF
//! 2. [`extract`]   read the text layer of the selected pages in
//!    `spawn_blocking`; [`layout`] groups positioned spans into cells
//! 3. [`normalize`] cell cleanup, noise filtering and record parsing
//! 4. [`merge`]     union of the increased and decreased tables
//! 5. [`reconcile`] join with the supplement spreadsheet, manuscript wins
//! 6. [`catalog`]   resolve CG numbers against the stock catalog
//! 7. [`lookup`]    batched gene-identifier queries with retry/backoff
//! 8. [`enrich`]    attach annotations and list unmapped identifiers
//!
//! [`sheet`] is the CSV/TSV reader shared by the two spreadsheet stages.

pub mod catalog;
pub mod enrich;
pub mod extract;
pub mod input;
pub mod layout;
pub mod lookup;
pub mod merge;
pub mod normalize;
pub mod reconcile;
pub(crate) mod sheet;
