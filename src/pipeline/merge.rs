//! Score merging: union of the increased and decreased tables.

use crate::error::RowIssue;
use crate::records::{Direction, SignificantLine};
use std::collections::HashSet;
use tracing::warn;

/// Union both tables into one significant-lines table sorted by `vdrc_id`.
///
/// Each line's `direction` is forced to the table it came from. A
/// change-in-memory flag that contradicts its table is reported and replaced
/// by the table's flag. Repeated VDRC IDs keep the first occurrence, increased
/// table first.
pub fn merge(
    increased: Vec<SignificantLine>,
    decreased: Vec<SignificantLine>,
) -> (Vec<SignificantLine>, Vec<RowIssue>) {
    let mut issues = Vec::new();
    let mut seen = HashSet::with_capacity(increased.len() + decreased.len());
    let mut merged = Vec::with_capacity(increased.len() + decreased.len());

    let tagged = increased
        .into_iter()
        .map(|l| (Direction::Increased, l))
        .chain(decreased.into_iter().map(|l| (Direction::Decreased, l)));

    for (direction, mut line) in tagged {
        line.direction = direction;
        let expected = direction.expected_flag();
        if line.change_in_memory != expected {
            warn!(
                "VDRC {}: change flag '{}' in the {} table",
                line.vdrc_id, line.change_in_memory, line.direction
            );
            issues.push(RowIssue::DirectionMismatch {
                vdrc_id: line.vdrc_id,
                flag: line.change_in_memory.to_string(),
                table: line.direction.to_string(),
            });
            line.change_in_memory = expected;
        }

        if !seen.insert(line.vdrc_id) {
            warn!("VDRC {} appears more than once in the manuscript", line.vdrc_id);
            issues.push(RowIssue::DuplicateKey {
                stage: "merge".into(),
                vdrc_id: line.vdrc_id,
            });
            continue;
        }
        merged.push(line);
    }

    merged.sort_by_key(|l| l.vdrc_id);
    (merged, issues)
}
