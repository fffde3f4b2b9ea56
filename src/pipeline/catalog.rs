//! Stock-catalog join: resolve each line's CG number.

use super::normalize::normalize_identifier;
use super::sheet::{cell, parse_vdrc_id, Sheet};
use crate::config::{CatalogColumns, IdentifierCorrections};
use crate::error::{CleanError, RowIssue};
use crate::records::{CatalogEntry, EnrichedRecord, ReconciledRecord};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Read the VDRC stock catalog. CG numbers go through the same identifier
/// normalization and corrections as the manuscript's.
pub fn read_catalog(
    path: &Path,
    columns: &CatalogColumns,
    corrections: &IdentifierCorrections,
) -> Result<(Vec<CatalogEntry>, Vec<RowIssue>), CleanError> {
    let mut sheet = Sheet::open(path)?;
    let id_col = sheet.required_column("vdrc_id", &columns.vdrc_id)?;
    let cg_col = sheet.required_column("cg_number", &columns.cg_number)?;
    let library_col = sheet.column(&columns.library);
    let synonyms_col = sheet.column(&columns.synonyms);
    let name = sheet.name();

    let mut entries = Vec::new();
    let mut issues = Vec::new();

    for row in sheet.rows() {
        let (line, rec) = row?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let vdrc_id = cell(&rec, Some(id_col)).and_then(|s| parse_vdrc_id(&s));
        let cg_number = cell(&rec, Some(cg_col));
        let (vdrc_id, cg_number) = match (vdrc_id, cg_number) {
            (Some(id), Some(cg)) => (id, cg),
            (id, _) => {
                issues.push(RowIssue::Unparsed {
                    table: name.clone(),
                    page: line,
                    raw: rec.iter().collect::<Vec<_>>().join("\t"),
                    detail: if id.is_none() {
                        "VDRC ID is not an integer".into()
                    } else {
                        "missing CG number".into()
                    },
                });
                continue;
            }
        };

        entries.push(CatalogEntry {
            vdrc_id,
            cg_number: normalize_identifier(&cg_number, corrections),
            library: cell(&rec, library_col),
            synonyms: cell(&rec, synonyms_col),
        });
    }

    info!("Catalog {}: {} entries", name, entries.len());
    Ok((entries, issues))
}

/// Attach a resolved CG number to every record.
///
/// The catalog reflects current annotation, so its CG number wins over the
/// manuscript's; a disagreement is reported. Lines the catalog does not know
/// keep the manuscript CG number, and supplement-only lines absent from the
/// catalog have none. Repeated catalog keys keep the first entry.
pub fn attach_catalog(
    records: Vec<ReconciledRecord>,
    catalog: &[CatalogEntry],
) -> (Vec<EnrichedRecord>, Vec<RowIssue>) {
    let mut issues = Vec::new();
    let mut by_id: HashMap<u32, &CatalogEntry> = HashMap::with_capacity(catalog.len());
    for entry in catalog {
        if by_id.contains_key(&entry.vdrc_id) {
            issues.push(RowIssue::DuplicateKey {
                stage: "catalog".into(),
                vdrc_id: entry.vdrc_id,
            });
            continue;
        }
        by_id.insert(entry.vdrc_id, entry);
    }

    let enriched = records
        .into_iter()
        .map(|record| {
            let manuscript_cg = record.significant.as_ref().map(|s| s.cg_number.clone());
            let catalog_cg = by_id.get(&record.vdrc_id).map(|e| e.cg_number.clone());

            let cg_number = match (manuscript_cg, catalog_cg) {
                (Some(m), Some(c)) => {
                    if m != c {
                        warn!(
                            "VDRC {}: manuscript {} vs catalog {}",
                            record.vdrc_id, m, c
                        );
                        issues.push(RowIssue::CatalogMismatch {
                            vdrc_id: record.vdrc_id,
                            manuscript: m,
                            catalog: c.clone(),
                        });
                    }
                    Some(c)
                }
                (m, c) => c.or(m),
            };

            EnrichedRecord {
                record,
                cg_number,
                gene_symbol: None,
                gene_name: None,
                flybase_id: None,
                entrez_id: None,
            }
        })
        .collect();

    (enriched, issues)
}
