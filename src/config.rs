//! Configuration types for a cleaning run.
//!
//! Every dataset-specific knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]: which PDF pages hold which table, how loose the
//! text-to-cell grouping is, what the spreadsheet headers are called, which
//! identifiers are known to be misprinted, and how to talk to the lookup
//! service.

use crate::error::CleanError;
use crate::pipeline::lookup::GeneLookup;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Default mygene.info-compatible query endpoint.
pub const DEFAULT_LOOKUP_URL: &str = "https://mygene.info/v3/query";

/// Configuration for one cleaning run.
///
/// # Example
/// ```rust
/// use memscreen::{PageSelection, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .increased_pages(PageSelection::Single(5))
///     .decreased_pages(PageSelection::Range(6, 9))
///     .batch_size(500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pages holding the "increased memory" table. Required.
    pub increased_pages: Option<PageSelection>,

    /// Pages holding the "decreased memory" table. Required.
    pub decreased_pages: Option<PageSelection>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// How positioned text is grouped into rows and cells.
    pub layout: LayoutConfig,

    /// Accepted header names for the supplement spreadsheet.
    pub supplement_columns: SupplementColumns,

    /// Accepted header names for the stock catalog.
    pub catalog_columns: CatalogColumns,

    /// Literal replacements for identifiers known to be misprinted.
    pub corrections: IdentifierCorrections,

    /// Pre-constructed lookup client. Takes precedence over `lookup_url`.
    pub lookup: Option<Arc<dyn GeneLookup>>,

    /// Skip the external lookup entirely (catalog join still runs). Default: false.
    pub skip_lookup: bool,

    /// Query endpoint for the default HTTP lookup. Default: mygene.info.
    pub lookup_url: String,

    /// Species filter sent with each query. Default: "fruitfly".
    pub species: String,

    /// Fields searched for each identifier. Default: "symbol,alias".
    pub scopes: String,

    /// Identifiers per lookup request. Range: 1–1000. Default: 1000.
    ///
    /// mygene.info rejects batch queries larger than 1000 terms.
    pub batch_size: usize,

    /// Lookup requests in flight at once. Default: 2.
    pub concurrency: usize,

    /// Retries per lookup batch. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-request lookup timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Published counts to check the scrape against. Mismatches are reported, not fatal.
    pub expectations: CountExpectations,

    /// When set, intermediate tables are written here as TSV.
    pub dump_dir: Option<PathBuf>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            increased_pages: None,
            decreased_pages: None,
            password: None,
            layout: LayoutConfig::default(),
            supplement_columns: SupplementColumns::default(),
            catalog_columns: CatalogColumns::default(),
            corrections: IdentifierCorrections::default(),
            lookup: None,
            skip_lookup: false,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            species: "fruitfly".to_string(),
            scopes: "symbol,alias".to_string(),
            batch_size: 1000,
            concurrency: 2,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            expectations: CountExpectations::default(),
            dump_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("increased_pages", &self.increased_pages)
            .field("decreased_pages", &self.decreased_pages)
            .field("layout", &self.layout)
            .field("corrections", &self.corrections.len())
            .field("lookup", &self.lookup.as_ref().map(|_| "<dyn GeneLookup>"))
            .field("skip_lookup", &self.skip_lookup)
            .field("lookup_url", &self.lookup_url)
            .field("species", &self.species)
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("expectations", &self.expectations)
            .field("dump_dir", &self.dump_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page selection for one table. Only valid after `build()`.
    pub(crate) fn pages_for(&self, direction: crate::records::Direction) -> PageSelection {
        let sel = match direction {
            crate::records::Direction::Increased => &self.increased_pages,
            crate::records::Direction::Decreased => &self.decreased_pages,
        };
        sel.clone().unwrap_or_default()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn increased_pages(mut self, pages: PageSelection) -> Self {
        self.config.increased_pages = Some(pages);
        self
    }

    pub fn decreased_pages(mut self, pages: PageSelection) -> Self {
        self.config.decreased_pages = Some(pages);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn supplement_columns(mut self, columns: SupplementColumns) -> Self {
        self.config.supplement_columns = columns;
        self
    }

    pub fn catalog_columns(mut self, columns: CatalogColumns) -> Self {
        self.config.catalog_columns = columns;
        self
    }

    pub fn corrections(mut self, corrections: IdentifierCorrections) -> Self {
        self.config.corrections = corrections;
        self
    }

    pub fn lookup(mut self, lookup: Arc<dyn GeneLookup>) -> Self {
        self.config.lookup = Some(lookup);
        self
    }

    pub fn skip_lookup(mut self, v: bool) -> Self {
        self.config.skip_lookup = v;
        self
    }

    pub fn lookup_url(mut self, url: impl Into<String>) -> Self {
        self.config.lookup_url = url.into();
        self
    }

    pub fn species(mut self, species: impl Into<String>) -> Self {
        self.config.species = species.into();
        self
    }

    pub fn scopes(mut self, scopes: impl Into<String>) -> Self {
        self.config.scopes = scopes.into();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.clamp(1, 1000);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn expectations(mut self, expectations: CountExpectations) -> Self {
        self.config.expectations = expectations;
        self
    }

    pub fn dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.dump_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, CleanError> {
        let c = &self.config;
        if c.increased_pages.is_none() {
            return Err(CleanError::InvalidConfig(
                "page range of the increased-memory table is not set".into(),
            ));
        }
        if c.decreased_pages.is_none() {
            return Err(CleanError::InvalidConfig(
                "page range of the decreased-memory table is not set".into(),
            ));
        }
        if c.layout.line_tolerance <= 0.0 || c.layout.cell_gap <= 0.0 {
            return Err(CleanError::InvalidConfig(format!(
                "layout tolerances must be positive, got line={} cell={}",
                c.layout.line_tolerance, c.layout.cell_gap
            )));
        }
        if !c.skip_lookup && c.lookup.is_none() && !is_http_url(&c.lookup_url) {
            return Err(CleanError::InvalidConfig(format!(
                "lookup URL must be http(s), got '{}'",
                c.lookup_url
            )));
        }
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Tolerances, in PDF points, for turning positioned text into a cell matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Spans whose vertical centres differ by at most this much share a row. Default: 2.5.
    pub line_tolerance: f32,
    /// Horizontally adjacent spans closer than this merge into one cell. Default: 4.0.
    pub cell_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 2.5,
            cell_gap: 4.0,
        }
    }
}

// ── Spreadsheet headers ──────────────────────────────────────────────────

/// Accepted header names for each supplement column, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementColumns {
    pub vdrc_id: Vec<String>,
    pub pi: Vec<String>,
    pub sem: Vec<String>,
    pub date: Vec<String>,
    pub physical_abnormality: Vec<String>,
}

impl Default for SupplementColumns {
    fn default() -> Self {
        Self {
            vdrc_id: strings(&["VDRC ID", "VDRC", "vdrc_id", "Transformant ID"]),
            pi: strings(&["PI", "Performance Index", "Primary PI", "pi"]),
            sem: strings(&["SEM", "S.E.M.", "Primary SEM", "sem"]),
            date: strings(&["Date", "Date tested", "date"]),
            physical_abnormality: strings(&[
                "Physical abnormality",
                "Physical abnormalities",
                "physical_abnormality",
                "Phys. abn.",
            ]),
        }
    }
}

/// Accepted header names for each stock-catalog column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogColumns {
    pub vdrc_id: Vec<String>,
    pub cg_number: Vec<String>,
    pub library: Vec<String>,
    pub synonyms: Vec<String>,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            vdrc_id: strings(&["VDRC ID", "Transformant ID", "vdrc_id", "ID"]),
            cg_number: strings(&["CG number", "CG", "Gene ID", "cg_number", "CG Number"]),
            library: strings(&["Library", "library"]),
            synonyms: strings(&["Synonyms", "synonyms", "Gene name"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Identifier corrections ───────────────────────────────────────────────

/// Literal `wrong → right` identifier replacements.
///
/// Keys are matched after the OCR digit fixes (`O`/`o` → `0`, `I`/`i`/`l`/`L`
/// → `1`), so a key must be written in that normalized form: `CG3123`, not
/// `CG3I23`.
///
/// Loaded from a two-column TSV (`wrong<TAB>right`); blank lines and lines
/// starting with `#` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifierCorrections {
    map: BTreeMap<String, String>,
}

impl IdentifierCorrections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, wrong: impl Into<String>, right: impl Into<String>) {
        self.map.insert(wrong.into(), right.into());
    }

    pub fn with(mut self, wrong: impl Into<String>, right: impl Into<String>) -> Self {
        self.insert(wrong, right);
        self
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Return the corrected identifier, or the input unchanged.
    pub fn apply(&self, id: &str) -> String {
        self.map
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Parse the two-column TSV form.
    pub fn parse_tsv(text: &str) -> Result<Self, CleanError> {
        let mut out = Self::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('\t') {
                Some((wrong, right)) if !wrong.trim().is_empty() && !right.trim().is_empty() => {
                    out.insert(wrong.trim(), right.trim());
                }
                _ => {
                    return Err(CleanError::InvalidConfig(format!(
                        "corrections line {}: expected 'wrong<TAB>right', got '{}'",
                        n + 1,
                        line
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Load corrections from a TSV file.
    pub fn load(path: &Path) -> Result<Self, CleanError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CleanError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => CleanError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => CleanError::Internal(format!("reading {}: {e}", path.display())),
        })?;
        Self::parse_tsv(&text)
    }
}

// ── Count expectations ───────────────────────────────────────────────────

/// Published row counts to compare the scrape against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountExpectations {
    pub increased: Option<usize>,
    pub decreased: Option<usize>,
    pub significant: Option<usize>,
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF hold a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page.
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// 1-indexed pages the selection names beyond `total_pages`.
    /// [`to_indices`](Self::to_indices) drops these.
    pub fn out_of_range(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => Vec::new(),
            PageSelection::Single(p) => vec![*p],
            PageSelection::Range(start, end) => ((*start).max(1)..=*end).collect(),
            PageSelection::Set(pages) => pages.clone(),
        };
        pages.retain(|&p| p > total_pages);
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

impl FromStr for PageSelection {
    type Err = CleanError;

    /// Parse `all`, `5`, `3-15`, or `1,3,5,7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let invalid = |msg: String| CleanError::InvalidConfig(msg);
        let page = |p: &str| -> Result<usize, CleanError> {
            let n: usize = p
                .trim()
                .parse()
                .map_err(|_| invalid(format!("invalid page number: '{}'", p.trim())))?;
            if n < 1 {
                return Err(invalid(format!("pages are 1-indexed, minimum is 1 (got {n})")));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(invalid(format!(
                    "invalid page range '{start}-{end}': start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }

        if s.contains(',') {
            let pages = s.split(',').map(page).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }

        Ok(PageSelection::Single(page(&s)?))
    }
}
