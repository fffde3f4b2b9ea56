//! Attach lookup results to catalog-resolved records.

use crate::records::{EnrichedRecord, GeneAnnotation};
use std::collections::{BTreeSet, HashMap};

/// Fill gene fields from `annotations`, keyed by resolved CG number.
///
/// Returns the records and the sorted, distinct CG numbers that had no
/// annotation. Records without any CG number are not counted as unmapped.
pub fn enrich(
    mut records: Vec<EnrichedRecord>,
    annotations: &HashMap<String, GeneAnnotation>,
) -> (Vec<EnrichedRecord>, Vec<String>) {
    let mut unmapped = BTreeSet::new();

    for rec in &mut records {
        let Some(cg) = rec.cg_number.as_deref() else {
            continue;
        };
        match annotations.get(cg) {
            Some(a) => {
                rec.gene_symbol = a.symbol.clone();
                rec.gene_name = a.name.clone();
                rec.flybase_id = a.flybase_id.clone();
                rec.entrez_id = a.entrez_id.clone();
            }
            None => {
                unmapped.insert(cg.to_string());
            }
        }
    }

    (records, unmapped.into_iter().collect())
}

/// The CG numbers worth sending to the lookup.
pub fn lookup_queries(records: &[EnrichedRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.cg_number.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
