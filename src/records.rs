//! Record types flowing between pipeline stages.
//!
//! Every stage consumes and produces plain in-memory tables (`Vec<T>` sorted
//! by `vdrc_id`). Nothing here is persisted except through
//! [`crate::output::write_tsv`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `+` / `-` flag as printed in the paper's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl Flag {
    /// Parse an already-cleaned token. Only the exact characters `+` and `-`
    /// are flags; encoding variants are folded earlier by
    /// [`crate::pipeline::normalize::clean_cell`].
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Flag::Plus),
            "-" => Some(Flag::Minus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Plus => "+",
            Flag::Minus => "-",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two manuscript tables a line was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Knockdown increased memory.
    Increased,
    /// Knockdown decreased memory.
    Decreased,
}

impl Direction {
    /// The change-in-memory flag this table implies.
    pub fn expected_flag(&self) -> Flag {
        match self {
            Direction::Increased => Flag::Plus,
            Direction::Decreased => Flag::Minus,
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Direction::Increased => "increased",
            Direction::Decreased => "decreased",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One row of the manuscript's significant-lines tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantLine {
    pub vdrc_id: u32,
    pub cg_number: String,
    pub primary_pi: f64,
    pub primary_sem: f64,
    pub secondary_pi: f64,
    pub secondary_sem: f64,
    pub physical_abnormality: Flag,
    pub mean_activity_difference: Option<f64>,
    pub act_sig: Option<Flag>,
    pub change_in_memory: Flag,
    /// Table the line was scraped from.
    pub direction: Direction,
    /// 1-indexed PDF page the line was found on.
    pub page: usize,
}

/// One row of the supplementary full-results spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementRecord {
    pub vdrc_id: u32,
    pub pi: f64,
    pub sem: f64,
    pub date: Option<NaiveDate>,
    pub physical_abnormality: Option<Flag>,
}

/// Where a reconciled row's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSource {
    /// In the supplement and the manuscript; manuscript values win.
    Both,
    /// Screened but not significant.
    SupplementOnly,
    /// Significant in the manuscript but absent from the supplement.
    ManuscriptOnly,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Both => "both",
            RecordSource::SupplementOnly => "supplement",
            RecordSource::ManuscriptOnly => "manuscript",
        }
    }
}

/// One line after the supplement join. `vdrc_id` is unique across the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub vdrc_id: u32,
    pub pi: f64,
    pub sem: f64,
    pub date: Option<NaiveDate>,
    pub physical_abnormality: Option<Flag>,
    pub significant: Option<SignificantLine>,
    pub source: RecordSource,
}

/// One row of the stock-center catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub vdrc_id: u32,
    pub cg_number: String,
    pub library: Option<String>,
    pub synonyms: Option<String>,
}

/// Stable gene identifiers returned by the external lookup for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneAnnotation {
    /// The CG number that was asked for.
    pub query: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub flybase_id: Option<String>,
    pub entrez_id: Option<String>,
}

/// The final, flat record written to the output TSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: ReconciledRecord,
    /// CG number after catalog resolution and identifier corrections.
    pub cg_number: Option<String>,
    pub gene_symbol: Option<String>,
    pub gene_name: Option<String>,
    pub flybase_id: Option<String>,
    pub entrez_id: Option<String>,
}

impl EnrichedRecord {
    pub fn vdrc_id(&self) -> u32 {
        self.record.vdrc_id
    }
}
