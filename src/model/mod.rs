//! Wire types exchanged with the attendance service.
//!
//! Every inbound type deserializes leniently: the service stores rolls and
//! semesters as either strings or integers and uses `roll` and `roll_no`
//! interchangeably, so each type goes through a raw shape first.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    #[default]
    Absent,
}

impl AttendanceStatus {
    /// Anything other than a case-insensitive `present` is `Absent`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("present") => Self::Present,
            _ => Self::Absent,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(Self::normalize(value.as_ref().and_then(Value::as_str)))
    }
}

fn value_to_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_semester(value: Option<Value>) -> Option<u8> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u8>().ok(),
        _ => None,
    }
}

fn value_to_date(value: Option<Value>) -> Option<NaiveDate> {
    let raw = value_to_string(value)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()
}

pub fn normalize_branch(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Default, Deserialize)]
struct RawStudent {
    roll: Option<Value>,
    roll_no: Option<Value>,
    name: Option<Value>,
    branch: Option<Value>,
    semester: Option<Value>,
}

/// A registered student. `roll` is unique within a branch and semester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStudent")]
pub struct Student {
    pub roll: String,
    pub name: String,
    pub branch: String,
    pub semester: Option<u8>,
}

impl From<RawStudent> for Student {
    fn from(raw: RawStudent) -> Self {
        let roll = value_to_string(raw.roll_no)
            .or_else(|| value_to_string(raw.roll))
            .unwrap_or_default();
        Self {
            roll,
            name: value_to_string(raw.name).unwrap_or_default(),
            branch: normalize_branch(&value_to_string(raw.branch).unwrap_or_default()),
            semester: value_to_semester(raw.semester),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSubject {
    code: Option<Value>,
    name: Option<Value>,
    branch: Option<Value>,
    semester: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSubject")]
pub struct Subject {
    pub code: String,
    pub name: String,
    pub branch: Option<String>,
    pub semester: Option<u8>,
}

impl From<RawSubject> for Subject {
    fn from(raw: RawSubject) -> Self {
        Self {
            code: value_to_string(raw.code).unwrap_or_default(),
            name: value_to_string(raw.name).unwrap_or_default(),
            branch: value_to_string(raw.branch).map(|b| normalize_branch(&b)),
            semester: value_to_semester(raw.semester),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawAttendanceRecord {
    #[serde(rename = "_id")]
    object_id: Option<Value>,
    id: Option<Value>,
    roll: Option<Value>,
    roll_no: Option<Value>,
    name: Option<Value>,
    branch: Option<Value>,
    semester: Option<Value>,
    subject_code: Option<Value>,
    subject: Option<Value>,
    date: Option<Value>,
    #[serde(default)]
    status: AttendanceStatus,
}

/// One persisted (or about to be persisted) attendance mark.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAttendanceRecord")]
pub struct AttendanceRecord {
    pub id: Option<String>,
    pub roll: String,
    pub name: String,
    pub branch: String,
    pub semester: Option<u8>,
    pub subject_code: String,
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
}

impl From<RawAttendanceRecord> for AttendanceRecord {
    fn from(raw: RawAttendanceRecord) -> Self {
        let roll = value_to_string(raw.roll_no)
            .or_else(|| value_to_string(raw.roll))
            .unwrap_or_default();
        let subject_code = value_to_string(raw.subject_code)
            .or_else(|| value_to_string(raw.subject))
            .unwrap_or_default();
        Self {
            id: value_to_string(raw.object_id).or_else(|| value_to_string(raw.id)),
            roll,
            name: value_to_string(raw.name).unwrap_or_default(),
            branch: value_to_string(raw.branch).unwrap_or_default(),
            semester: value_to_semester(raw.semester),
            subject_code,
            date: value_to_date(raw.date),
            status: raw.status,
        }
    }
}

/// Server reply for mutations: `{message}` on success, `{error}` on failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessageBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl MessageBody {
    pub fn error_text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkEntry {
    pub roll_no: String,
    pub name: String,
    pub branch: String,
    pub semester: u8,
    pub subject_code: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkAttendanceRequest {
    pub attendance: Vec<BulkEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaveAttendanceRequest {
    pub roll: String,
    pub roll_no: String,
    pub name: String,
    pub semester: u8,
    pub branch: String,
    pub subject_code: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddSubjectRequest {
    pub code: String,
    pub name: String,
    pub branch: String,
    pub semester: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
}

impl ReportType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Body of the server-rendered spreadsheet export. `subject` is empty for
/// "all subjects".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilteredReportRequest {
    pub semester: u8,
    pub branch: String,
    pub subject: String,
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub include_present: bool,
    pub include_absent: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub roll_no: String,
    pub name: String,
    pub branch: String,
    pub semester: u8,
    pub face_image: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartSessionRequest {
    pub subject_code: String,
    pub semester: u8,
    pub branch: String,
    pub timing: String,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StartSessionResponse {
    pub message: Option<String>,
    pub excel_file: Option<String>,
}
