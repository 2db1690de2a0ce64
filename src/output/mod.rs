pub mod report;

use colored::Colorize;
use serde::Serialize;

use crate::engine::{GroupedAttendance, Report, RosterRow};
use crate::model::{AttendanceStatus, Student, Subject};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
    Csv,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".csv") {
        return Some(OutputFormat::Csv);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Status(AttendanceStatus),
}

impl Cell {
    fn plain(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Status(s) => s.label(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Display-ready table shared by the text, CSV and HTML renderers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Grouped records: roll, name, branch, then one column per derived subject.
pub fn grouped_table(grouped: &GroupedAttendance, columns: &[String]) -> Table {
    let mut headers = vec!["Roll".to_string(), "Name".to_string(), "Branch".to_string()];
    headers.extend(columns.iter().cloned());
    let rows = grouped
        .rows()
        .iter()
        .map(|row| {
            let mut cells: Vec<Cell> = vec![
                row.roll.as_str().into(),
                row.name.as_str().into(),
                row.branch.as_str().into(),
            ];
            cells.extend(columns.iter().map(|code| Cell::Status(row.status_for(code))));
            cells
        })
        .collect();
    Table {
        title: "Attendance records".to_string(),
        headers,
        rows,
    }
}

pub fn report_table(report: &Report) -> Table {
    let mut headers = vec!["Roll".to_string(), "Name".to_string(), "Branch".to_string()];
    headers.extend(report.columns.iter().map(|c| {
        if c.name.is_empty() || c.name == c.code {
            c.code.clone()
        } else {
            format!("{} ({})", c.code, c.name)
        }
    }));
    headers.push("Present".to_string());
    headers.push("%".to_string());
    let rows = report
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<Cell> = vec![
                row.roll.as_str().into(),
                row.name.as_str().into(),
                row.branch.as_str().into(),
            ];
            cells.extend(row.cells.iter().map(|c| Cell::Status(c.status)));
            cells.push(format!("{}/{}", row.present_count, row.counted_subjects).into());
            cells.push(row.percentage_display().into());
            cells
        })
        .collect();
    let title = match report.date {
        Some(date) => format!("Attendance report for {}", date.format("%Y-%m-%d")),
        None => "Attendance report".to_string(),
    };
    Table {
        title,
        headers,
        rows,
    }
}

pub fn roster_table(rows: &[RosterRow]) -> Table {
    let headers = ["Roll", "Name", "Branch", "Subject", "Status", "Record"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = rows
        .iter()
        .map(|row| {
            vec![
                row.roll.as_str().into(),
                row.name.as_str().into(),
                row.branch.as_str().into(),
                row.subject_code.as_str().into(),
                Cell::Status(row.status),
                row.record_id.clone().unwrap_or_default().into(),
            ]
        })
        .collect();
    Table {
        title: "Subject roster".to_string(),
        headers,
        rows,
    }
}

pub fn subjects_table(subjects: &[Subject]) -> Table {
    Table {
        title: "Subjects".to_string(),
        headers: vec!["Code".to_string(), "Name".to_string()],
        rows: subjects
            .iter()
            .map(|s| vec![s.code.as_str().into(), s.name.as_str().into()])
            .collect(),
    }
}

pub fn students_table(students: &[Student]) -> Table {
    Table {
        title: "Students".to_string(),
        headers: vec!["Roll".to_string(), "Name".to_string(), "Branch".to_string()],
        rows: students
            .iter()
            .map(|s| {
                vec![
                    s.roll.as_str().into(),
                    s.name.as_str().into(),
                    s.branch.as_str().into(),
                ]
            })
            .collect(),
    }
}

pub fn branches_table(branches: &[String]) -> Table {
    Table {
        title: "Branches".to_string(),
        headers: vec!["Branch".to_string()],
        rows: branches.iter().map(|b| vec![b.as_str().into()]).collect(),
    }
}

/// Aligned columns; status cells are coloured unless colouring is globally off.
pub fn render_text(table: &Table, empty_message: &str) -> Vec<u8> {
    if table.is_empty() {
        return format!("{empty_message}\n").into_bytes();
    }
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.plain().chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let mut out = String::new();
    let header = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&format!("{}\n", header.trim_end().bold()));
    for row in &table.rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let padded = format!("{:<width$}", cell.plain(), width = widths[i]);
                match cell {
                    Cell::Status(AttendanceStatus::Present) => padded.green().to_string(),
                    Cell::Status(AttendanceStatus::Absent) => padded.red().to_string(),
                    Cell::Text(_) => padded,
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"[]".to_vec());
    out.push(b'\n');
    out
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells.map(csv_quote).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

pub fn render_csv(table: &Table) -> Vec<u8> {
    let mut out = csv_line(table.headers.iter().map(String::as_str));
    for row in &table.rows {
        out.push_str(&csv_line(row.iter().map(Cell::plain)));
    }
    out.into_bytes()
}

pub fn render_html(table: &Table) -> Vec<u8> {
    report::render_html(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{build_report, group_records, select_subjects};
    use crate::model::AttendanceRecord;

    fn record(roll: &str, code: &str, status: &str) -> AttendanceRecord {
        serde_json::from_value(serde_json::json!({
            "roll_no": roll, "name": format!("N{roll}"), "branch": "CSE",
            "subject_code": code, "date": "2024-01-02", "status": status
        }))
        .unwrap()
    }

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(infer_format_from_path("out.CSV"), Some(OutputFormat::Csv));
        assert_eq!(infer_format_from_path("a/b.htm"), Some(OutputFormat::Html));
        assert_eq!(infer_format_from_path("report.xlsx"), None);
        assert_eq!(OutputFormat::parse(" JSON "), Some(OutputFormat::Json));
    }

    #[test]
    fn grouped_table_fills_missing_subjects_as_absent() {
        let records = vec![record("1", "CS1", "present"), record("2", "CS2", "present")];
        let grouped = group_records(&records);
        let table = grouped_table(&grouped, &["CS1".to_string(), "CS2".to_string()]);
        assert_eq!(table.headers, vec!["Roll", "Name", "Branch", "CS1", "CS2"]);
        assert_eq!(table.rows[0][4], Cell::Status(AttendanceStatus::Absent));
        assert_eq!(table.rows[1][3], Cell::Status(AttendanceStatus::Absent));
        assert_eq!(table.rows[1][4], Cell::Status(AttendanceStatus::Present));
    }

    #[test]
    fn csv_quotes_commas_and_quotes() {
        let table = Table {
            title: String::new(),
            headers: vec!["Name".to_string()],
            rows: vec![vec!["Rao, \"Ravi\"".into()]],
        };
        let csv = String::from_utf8(render_csv(&table)).unwrap();
        assert_eq!(csv, "Name\n\"Rao, \"\"Ravi\"\"\"\n");
    }

    #[test]
    fn report_table_shows_two_decimal_percentage() {
        let subjects: Vec<Subject> = vec![
            serde_json::from_value(serde_json::json!({"code": "CS1", "name": "Data"})).unwrap(),
            serde_json::from_value(serde_json::json!({"code": "CS2", "name": "CS2"})).unwrap(),
        ];
        let students: Vec<Student> = vec![serde_json::from_value(
            serde_json::json!({"roll": "1", "name": "A", "branch": "CSE"}),
        )
        .unwrap()];
        let report = build_report(
            &students,
            &select_subjects(&subjects, None),
            &[record("1", "CS1", "present")],
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        let table = report_table(&report);
        assert_eq!(table.headers[3], "CS1 (Data)");
        assert_eq!(table.headers[4], "CS2");
        let row = &table.rows[0];
        assert_eq!(row[row.len() - 1], Cell::Text("50.00".to_string()));
        assert_eq!(row[row.len() - 2], Cell::Text("1/2".to_string()));
    }

    #[test]
    fn empty_table_renders_message() {
        colored::control::set_override(false);
        let out = render_text(&Table::default(), "No data found");
        assert_eq!(out, b"No data found\n");
    }
}
