use chrono::NaiveDate;

use crate::cli::args::{CliArgs, Command, FilterArgs};
use crate::model::ReportType;
use crate::output::OutputFormat;

pub fn parse_date(raw: &str, flag: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid {flag} '{raw}', expected YYYY-MM-DD"))
}

pub fn parse_optional_date(raw: Option<&str>, flag: &str) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => parse_date(raw, flag).map(Some),
        None => Ok(None),
    }
}

pub fn check_semester(semester: Option<u8>) -> Result<(), String> {
    match semester {
        Some(s) if !(1..=8).contains(&s) => {
            Err(format!("invalid --semester {s}, expected 1 through 8"))
        }
        _ => Ok(()),
    }
}

pub fn parse_status(raw: &str) -> Result<crate::model::AttendanceStatus, String> {
    match raw.trim().to_lowercase().as_str() {
        "present" | "p" => Ok(crate::model::AttendanceStatus::Present),
        "absent" | "a" => Ok(crate::model::AttendanceStatus::Absent),
        _ => Err(format!("invalid --status '{raw}', expected present or absent")),
    }
}

fn check_filters(filters: &FilterArgs) -> Result<(), String> {
    check_semester(filters.semester)?;
    parse_optional_date(filters.date.as_deref(), "--date")?;
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --format '{raw}', expected text, json, html, or csv"
            ));
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected positive integer".to_string());
        }
    }

    match &args.command {
        Command::InitConfig | Command::Branches | Command::Delete { .. } => {}
        Command::Subjects { semester, .. } | Command::Students { semester, .. } => {
            check_semester(*semester)?;
        }
        Command::Records { filters }
        | Command::Report { filters, .. }
        | Command::Roster { filters }
        | Command::Bulk { filters, .. }
        | Command::StartSession { filters, .. } => check_filters(filters)?,
        Command::Mark {
            filters, status, ..
        } => {
            check_filters(filters)?;
            parse_status(status)?;
        }
        Command::AddSubject { semester, .. } | Command::Register { semester, .. } => {
            check_semester(*semester)?;
        }
        Command::Export {
            semester,
            report_type,
            start,
            end,
            exclude_present,
            exclude_absent,
            ..
        } => {
            check_semester(*semester)?;
            if ReportType::parse(report_type).is_none() {
                return Err(format!(
                    "invalid --report-type '{report_type}', expected daily, weekly, or monthly"
                ));
            }
            let start = parse_optional_date(start.as_deref(), "--start")?;
            let end = parse_optional_date(end.as_deref(), "--end")?;
            if let (Some(start), Some(end)) = (start, end) {
                if start > end {
                    return Err("Start date cannot be after end date.".to_string());
                }
            }
            if *exclude_present && *exclude_absent {
                return Err("Nothing to export with both present and absent excluded.".to_string());
            }
        }
    }
    Ok(())
}
