use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, Student, Subject};

use super::filters::Selection;

/// Parameters a date report cannot run without.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportParams {
    pub semester: u8,
    pub date: NaiveDate,
    pub branch: Option<String>,
    pub subject: Option<String>,
    pub roll: Option<String>,
}

impl ReportParams {
    pub fn from_selection(selection: &Selection) -> Result<Self> {
        let (Some(semester), Some(date)) = (selection.semester, selection.date) else {
            return Err(Error::precondition("Please select both Semester and Date"));
        };
        Ok(Self {
            semester,
            date,
            branch: selection.branch.clone(),
            subject: selection.subject.clone(),
            roll: selection.roll.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportColumn {
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportCell {
    pub subject_code: String,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub roll: String,
    pub name: String,
    pub branch: String,
    pub cells: Vec<ReportCell>,
    pub present_count: usize,
    pub counted_subjects: usize,
    #[serde(serialize_with = "serialize_percentage")]
    pub percentage: f64,
}

fn serialize_percentage<S: serde::Serializer>(
    value: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_percentage(*value))
}

impl ReportRow {
    pub fn percentage_display(&self) -> String {
        format_percentage(self.percentage)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    pub date: Option<NaiveDate>,
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<ReportRow>,
}

pub fn percentage(present: usize, counted: usize) -> f64 {
    if counted == 0 {
        return 0.0;
    }
    present as f64 / counted as f64 * 100.0
}

pub fn format_percentage(value: f64) -> String {
    format!("{value:.2}")
}

/// Students matching the optional branch and roll filters, roster order kept.
pub fn filter_students(students: &[Student], branch: Option<&str>, roll: Option<&str>) -> Vec<Student> {
    let branch = branch.map(crate::model::normalize_branch);
    let roll = roll.map(str::trim).filter(|r| !r.is_empty());
    students
        .iter()
        .filter(|s| branch.as_deref().map_or(true, |b| b.is_empty() || s.branch == b))
        .filter(|s| roll.map_or(true, |r| s.roll == r))
        .cloned()
        .collect()
}

/// Subject columns to render. A requested code narrows to that one subject;
/// an unknown code yields no columns.
pub fn select_subjects<'a>(subjects: &'a [Subject], subject: Option<&str>) -> Vec<&'a Subject> {
    match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(code) => subjects.iter().filter(|s| s.code == code).collect(),
        None => subjects.iter().collect(),
    }
}

/// One row per student with per-subject status on `date`. A missing record
/// counts as absent. Duplicate records for the same roll and subject resolve
/// to the last one in `records`.
pub fn build_report(
    students: &[Student],
    subjects: &[&Subject],
    records: &[AttendanceRecord],
    date: NaiveDate,
) -> Report {
    let mut by_key: HashMap<(&str, &str), AttendanceStatus> = HashMap::new();
    for rec in records.iter().filter(|r| r.date == Some(date)) {
        by_key.insert((rec.roll.as_str(), rec.subject_code.as_str()), rec.status);
    }

    let columns = subjects
        .iter()
        .map(|s| ReportColumn {
            code: s.code.clone(),
            name: s.name.clone(),
        })
        .collect::<Vec<_>>();

    let rows = students
        .iter()
        .map(|student| {
            let cells = columns
                .iter()
                .map(|col| ReportCell {
                    subject_code: col.code.clone(),
                    status: by_key
                        .get(&(student.roll.as_str(), col.code.as_str()))
                        .copied()
                        .unwrap_or_default(),
                })
                .collect::<Vec<_>>();
            let present_count = cells.iter().filter(|c| c.status.is_present()).count();
            let counted_subjects = cells.len();
            ReportRow {
                roll: student.roll.clone(),
                name: student.name.clone(),
                branch: student.branch.clone(),
                present_count,
                counted_subjects,
                percentage: percentage(present_count, counted_subjects),
                cells,
            }
        })
        .collect();

    Report {
        date: Some(date),
        columns,
        rows,
    }
}

/// One student's mark for a single subject and date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    pub roll: String,
    pub name: String,
    pub branch: String,
    pub semester: u8,
    pub subject_code: String,
    pub status: AttendanceStatus,
    /// Present only when a persisted record backs this row.
    pub record_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterParams {
    pub semester: u8,
    pub branch: String,
    pub subject: String,
    pub date: NaiveDate,
}

impl RosterParams {
    pub fn from_selection(selection: &Selection) -> Result<Self> {
        match (
            selection.semester,
            selection.branch.as_deref().filter(|b| !b.trim().is_empty()),
            selection.subject.as_deref().filter(|s| !s.trim().is_empty()),
            selection.date,
        ) {
            (Some(semester), Some(branch), Some(subject), Some(date)) => Ok(Self {
                semester,
                branch: crate::model::normalize_branch(branch),
                subject: subject.trim().to_string(),
                date,
            }),
            _ => Err(Error::precondition(
                "Please select all filters: semester, branch, subject, and date.",
            )),
        }
    }
}

/// Every student of the semester and branch with their status for one
/// subject. Records from other subjects or dates are ignored.
pub fn build_roster(
    students: &[Student],
    records: &[AttendanceRecord],
    params: &RosterParams,
) -> Vec<RosterRow> {
    let mut by_roll: HashMap<&str, &AttendanceRecord> = HashMap::new();
    // `/mark/get` already filtered by date; undated rows belong to it.
    for rec in records.iter().filter(|r| {
        r.subject_code == params.subject && r.date.map_or(true, |d| d == params.date)
    }) {
        by_roll.insert(rec.roll.as_str(), rec);
    }

    students
        .iter()
        .filter(|s| s.semester == Some(params.semester) && s.branch == params.branch)
        .map(|s| {
            let matched = by_roll.get(s.roll.as_str());
            RosterRow {
                roll: s.roll.clone(),
                name: s.name.clone(),
                branch: s.branch.clone(),
                semester: params.semester,
                subject_code: params.subject.clone(),
                status: matched.map(|r| r.status).unwrap_or_default(),
                record_id: matched.and_then(|r| r.id.clone()),
            }
        })
        .collect()
}
