//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the run moves through its stages and lookup batches.
//!
//! # Example
//!
//! ```rust
//! use memscreen::{PageSelection, PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, rows: usize) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage}: {rows} rows");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { stages: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .increased_pages(PageSelection::Single(5))
//!     .decreased_pages(PageSelection::Single(6))
//!     .progress_callback(cb as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The linear stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    Normalize,
    Merge,
    Reconcile,
    Catalog,
    Lookup,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Merge => "merge",
            Stage::Reconcile => "reconcile",
            Stage::Catalog => "catalog",
            Stage::Lookup => "lookup",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// Implementations must be `Send + Sync`: lookup batches run concurrently and
/// `on_batch_complete` may be called from different tasks. All methods have
/// default no-op implementations.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first stage.
    fn on_pipeline_start(&self) {}

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage ends, with the number of rows it produced.
    fn on_stage_complete(&self, stage: Stage, rows: usize) {
        let _ = (stage, rows);
    }

    /// Called after each lookup batch, successful or not.
    ///
    /// # Arguments
    /// * `batch` — 1-indexed batch number
    /// * `total` — number of batches
    /// * `hits`  — identifiers that resolved (0 when the batch failed)
    fn on_batch_complete(&self, batch: usize, total: usize, hits: usize) {
        let _ = (batch, total, hits);
    }

    /// Called once after the output has been assembled.
    ///
    /// # Arguments
    /// * `records` — rows in the final table
    /// * `issues`  — non-fatal issues collected along the way
    fn on_pipeline_complete(&self, records: usize, issues: usize) {
        let _ = (records, issues);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
