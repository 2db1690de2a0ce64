use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{AttendanceRecord, AttendanceStatus};

/// One student's status across every subject seen for them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AggregatedRow {
    pub roll: String,
    pub name: String,
    pub branch: String,
    pub subjects: BTreeMap<String, AttendanceStatus>,
}

impl AggregatedRow {
    /// Subjects with no record for this student read as absent.
    pub fn status_for(&self, subject_code: &str) -> AttendanceStatus {
        self.subjects
            .get(subject_code)
            .copied()
            .unwrap_or(AttendanceStatus::Absent)
    }
}

/// Records keyed by roll number, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedAttendance {
    rows: Vec<AggregatedRow>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl GroupedAttendance {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, roll: &str) -> Option<&AggregatedRow> {
        self.index.get(roll).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[AggregatedRow] {
        &self.rows
    }

    pub fn rolls(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.roll.as_str())
    }

    fn entry(&mut self, record: &AttendanceRecord) -> &mut AggregatedRow {
        let idx = match self.index.get(&record.roll) {
            Some(&idx) => idx,
            None => {
                self.rows.push(AggregatedRow {
                    roll: record.roll.clone(),
                    name: record.name.clone(),
                    branch: record.branch.clone(),
                    subjects: BTreeMap::new(),
                });
                let idx = self.rows.len() - 1;
                self.index.insert(record.roll.clone(), idx);
                idx
            }
        };
        &mut self.rows[idx]
    }
}

/// Reshape flat records into one row per roll. Name and branch come from the
/// first record seen for a roll; a later record for the same subject
/// overwrites the earlier status.
pub fn group_records<'a, I>(records: I) -> GroupedAttendance
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut grouped = GroupedAttendance::default();
    for record in records {
        let row = grouped.entry(record);
        row.subjects
            .insert(record.subject_code.clone(), record.status);
    }
    grouped
}
