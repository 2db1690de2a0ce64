use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// What a delete request is aimed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    /// One persisted attendance row, addressed by its store identifier.
    SingleRecord(String),
    /// Every attendance row carrying this roll number.
    RollNumber(String),
}

fn record_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("record id pattern"))
}

/// The store issues 24 hex-digit identifiers. Roll numbers never take that
/// shape, but nothing guarantees it; keep the heuristic here only.
pub fn is_record_identifier(value: &str) -> bool {
    record_id_re().is_match(value)
}

/// Classify a trimmed delete target. Empty input classifies as a roll number.
pub fn classify(value: &str) -> DeleteTarget {
    let value = value.trim();
    if is_record_identifier(value) {
        DeleteTarget::SingleRecord(value.to_string())
    } else {
        DeleteTarget::RollNumber(value.to_string())
    }
}

/// Classify for an actual delete. Rejects empty input before any request.
pub fn resolve_delete_target(value: Option<&str>) -> Result<DeleteTarget> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(Error::precondition(
            "Nothing to delete: no record identifier or roll number given.",
        ));
    }
    Ok(classify(value))
}
