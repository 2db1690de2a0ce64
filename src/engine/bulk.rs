use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::model::{normalize_branch, AttendanceStatus, BulkAttendanceRequest, BulkEntry};

use super::filters::Selection;
use super::report::RosterRow;

/// A displayed table row that can be submitted as one attendance entry.
pub trait StatusRow {
    fn roll(&self) -> &str;
    fn name(&self) -> &str;
    fn branch(&self) -> &str;
    fn status(&self) -> AttendanceStatus;
}

impl StatusRow for RosterRow {
    fn roll(&self) -> &str {
        &self.roll
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn branch(&self) -> &str {
        &self.branch
    }

    fn status(&self) -> AttendanceStatus {
        self.status
    }
}

/// Filter values shared by every row of a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkFilters {
    pub semester: u8,
    pub branch: String,
    pub subject: String,
    pub date: NaiveDate,
}

impl BulkFilters {
    pub fn from_selection(selection: &Selection) -> Result<Self> {
        match (
            selection.semester,
            selection.branch.as_deref().filter(|b| !b.trim().is_empty()),
            selection.subject.as_deref().filter(|s| !s.trim().is_empty()),
            selection.date,
        ) {
            (Some(semester), Some(branch), Some(subject), Some(date)) => Ok(Self {
                semester,
                branch: normalize_branch(branch),
                subject: subject.trim().to_string(),
                date,
            }),
            _ => Err(Error::precondition("Fill semester, subject, date and branch.")),
        }
    }
}

/// Serialize the table as displayed: one entry per row, status from the
/// row's current cell, subject/date/semester from the active filters.
/// Branch comes from the row and falls back to the filter when blank.
pub fn build_bulk_request<R: StatusRow>(
    rows: &[R],
    filters: &BulkFilters,
) -> Result<BulkAttendanceRequest> {
    if rows.is_empty() {
        return Err(Error::precondition("No rows to submit."));
    }
    let attendance = rows
        .iter()
        .map(|row| {
            let branch = if row.branch().trim().is_empty() {
                filters.branch.clone()
            } else {
                row.branch().trim().to_string()
            };
            BulkEntry {
                roll_no: row.roll().trim().to_string(),
                name: row.name().trim().to_string(),
                branch,
                semester: filters.semester,
                subject_code: filters.subject.clone(),
                date: filters.date,
                status: row.status(),
            }
        })
        .collect();
    Ok(BulkAttendanceRequest { attendance })
}

/// New roster with the given rolls flipped. Every named roll must be present
/// in the table and may not appear in both lists.
pub fn apply_status_edits(
    rows: &[RosterRow],
    present: &[String],
    absent: &[String],
) -> Result<Vec<RosterRow>> {
    let present: HashSet<&str> = present.iter().map(|r| r.trim()).collect();
    let absent: HashSet<&str> = absent.iter().map(|r| r.trim()).collect();

    if let Some(both) = present.intersection(&absent).next() {
        return Err(Error::precondition(format!(
            "roll {both} is marked both present and absent"
        )));
    }
    let known: HashSet<&str> = rows.iter().map(|r| r.roll.as_str()).collect();
    let mut unknown = present
        .iter()
        .chain(absent.iter())
        .filter(|r| !known.contains(*r))
        .copied()
        .collect::<Vec<_>>();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(Error::precondition(format!(
            "rolls not in the table: {}",
            unknown.join(", ")
        )));
    }

    Ok(rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            if present.contains(row.roll.as_str()) {
                row.status = AttendanceStatus::Present;
            } else if absent.contains(row.roll.as_str()) {
                row.status = AttendanceStatus::Absent;
            }
            row
        })
        .collect())
}
