use std::collections::BTreeSet;

use super::grouper::GroupedAttendance;

/// Union of every subject code referenced by any student, ascending.
pub fn derive_columns(grouped: &GroupedAttendance) -> Vec<String> {
    grouped
        .rows()
        .iter()
        .flat_map(|row| row.subjects.keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
