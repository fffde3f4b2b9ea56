//! Supplement reconciliation.
//!
//! The supplement lists every screened line, significant or not, and a few
//! lines were tested more than once so their VDRC ID repeats. The manuscript
//! tables are the curated version: where both exist, manuscript values win.

use super::sheet::{cell, parse_date, parse_flag, parse_number, parse_vdrc_id, Sheet};
use crate::config::SupplementColumns;
use crate::error::{CleanError, RowIssue};
use crate::records::{RecordSource, ReconciledRecord, SignificantLine, SupplementRecord};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read the supplementary full-results spreadsheet.
///
/// Rows without a usable VDRC ID, PI or SEM are reported and skipped. An
/// unreadable date or abnormality flag only blanks that field.
pub fn read_supplement(
    path: &Path,
    columns: &SupplementColumns,
) -> Result<(Vec<SupplementRecord>, Vec<RowIssue>), CleanError> {
    let mut sheet = Sheet::open(path)?;
    let id_col = sheet.required_column("vdrc_id", &columns.vdrc_id)?;
    let pi_col = sheet.required_column("pi", &columns.pi)?;
    let sem_col = sheet.required_column("sem", &columns.sem)?;
    let date_col = sheet.column(&columns.date);
    let phys_col = sheet.column(&columns.physical_abnormality);
    let name = sheet.name();

    let mut records = Vec::new();
    let mut issues = Vec::new();

    for row in sheet.rows() {
        let (line, rec) = row?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let parsed = (|| {
            let raw_id = cell(&rec, Some(id_col)).ok_or("missing VDRC ID")?;
            let vdrc_id = parse_vdrc_id(&raw_id).ok_or("VDRC ID is not an integer")?;
            let pi = cell(&rec, Some(pi_col))
                .as_deref()
                .and_then(parse_number)
                .ok_or("PI is not a number")?;
            let sem = cell(&rec, Some(sem_col))
                .as_deref()
                .and_then(parse_number)
                .ok_or("SEM is not a number")?;
            Ok::<_, &str>((vdrc_id, pi, sem))
        })();

        let (vdrc_id, pi, sem) = match parsed {
            Ok(v) => v,
            Err(detail) => {
                issues.push(RowIssue::Unparsed {
                    table: name.clone(),
                    page: line,
                    raw: rec.iter().collect::<Vec<_>>().join("\t"),
                    detail: detail.to_string(),
                });
                continue;
            }
        };

        let date = cell(&rec, date_col).and_then(|d| {
            let parsed = parse_date(&d);
            if parsed.is_none() {
                warn!("{}:{}: unreadable date '{}'", name, line, d);
            }
            parsed
        });
        let physical_abnormality = cell(&rec, phys_col).and_then(|f| parse_flag(&f));

        records.push(SupplementRecord {
            vdrc_id,
            pi,
            sem,
            date,
            physical_abnormality,
        });
    }

    info!(
        "Supplement {}: {} rows, {} unparsed",
        sheet.path().display(),
        records.len(),
        issues.len()
    );
    Ok((records, issues))
}

/// Join the significant lines against the supplement, one record per VDRC ID.
///
/// For a repeated supplement key the manuscript decides: the supplement row
/// whose PI is closest to the manuscript's primary PI supplies the date. A
/// repeated key with no manuscript line keeps its first row and is reported.
pub fn reconcile(
    significant: Vec<SignificantLine>,
    supplement: Vec<SupplementRecord>,
) -> (Vec<ReconciledRecord>, Vec<RowIssue>) {
    let mut by_id: BTreeMap<u32, Vec<SupplementRecord>> = BTreeMap::new();
    for row in supplement {
        by_id.entry(row.vdrc_id).or_default().push(row);
    }
    let mut manuscript: BTreeMap<u32, SignificantLine> =
        significant.into_iter().map(|s| (s.vdrc_id, s)).collect();

    let mut out = Vec::with_capacity(by_id.len() + manuscript.len());
    let mut issues = Vec::new();

    for (vdrc_id, rows) in by_id {
        match manuscript.remove(&vdrc_id) {
            Some(sig) => {
                let chosen = closest_to(&rows, sig.primary_pi);
                if rows.len() > 1 {
                    debug!(
                        "VDRC {}: {} supplement rows, kept the one dated {:?}",
                        vdrc_id,
                        rows.len(),
                        chosen.date
                    );
                }
                out.push(ReconciledRecord {
                    vdrc_id,
                    pi: sig.primary_pi,
                    sem: sig.primary_sem,
                    date: chosen.date,
                    physical_abnormality: Some(sig.physical_abnormality),
                    significant: Some(sig),
                    source: RecordSource::Both,
                });
            }
            None => {
                if rows.len() > 1 {
                    issues.push(RowIssue::DuplicateKey {
                        stage: "reconcile".into(),
                        vdrc_id,
                    });
                }
                let first = &rows[0];
                out.push(ReconciledRecord {
                    vdrc_id,
                    pi: first.pi,
                    sem: first.sem,
                    date: first.date,
                    physical_abnormality: first.physical_abnormality,
                    significant: None,
                    source: RecordSource::SupplementOnly,
                });
            }
        }
    }

    for (vdrc_id, sig) in manuscript {
        warn!("VDRC {} is significant but missing from the supplement", vdrc_id);
        out.push(ReconciledRecord {
            vdrc_id,
            pi: sig.primary_pi,
            sem: sig.primary_sem,
            date: None,
            physical_abnormality: Some(sig.physical_abnormality),
            significant: Some(sig),
            source: RecordSource::ManuscriptOnly,
        });
    }

    out.sort_by_key(|r| r.vdrc_id);
    (out, issues)
}

// Ties go to the earlier row.
fn closest_to(rows: &[SupplementRecord], pi: f64) -> &SupplementRecord {
    let mut best = &rows[0];
    for row in &rows[1..] {
        if (row.pi - pi).abs() < (best.pi - pi).abs() {
            best = row;
        }
    }
    best
}
