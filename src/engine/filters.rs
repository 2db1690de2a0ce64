//! Cascading filter selections: semester and branch drive the subject and
//! roll lists. Each dependent list is its own small state machine
//! (`Idle -> Loading -> Ready | Error`); a load result only lands if it
//! belongs to the list's newest load.

use std::fmt;

use chrono::NaiveDate;
use log::debug;

use crate::error::{Error, Result};
use crate::model::{normalize_branch, Student, Subject};

use super::view::{Generation, Ticket};

/// Immutable snapshot of the current selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub semester: Option<u8>,
    pub branch: Option<String>,
    pub subject: Option<String>,
    pub roll: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Semester,
    Branch,
    Subject,
    Roll,
    Date,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Semester => "semester",
            Self::Branch => "branch",
            Self::Subject => "subject",
            Self::Roll => "roll",
            Self::Date => "date",
        })
    }
}

pub trait ListItem {
    fn key(&self) -> &str;
}

impl ListItem for Subject {
    fn key(&self) -> &str {
        &self.code
    }
}

impl ListItem for Student {
    fn key(&self) -> &str {
        &self.roll
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Subjects,
    Rolls,
}

impl ListKind {
    fn noun(self) -> &'static str {
        match self {
            Self::Subjects => "subjects",
            Self::Rolls => "students",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListState<T> {
    Idle,
    Loading(Ticket),
    Ready(Vec<T>),
    Error,
}

#[derive(Clone, Debug)]
pub struct DependentList<T> {
    kind: ListKind,
    generation: Generation,
    state: ListState<T>,
    selected: Option<String>,
}

impl<T: ListItem> DependentList<T> {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            generation: Generation::default(),
            state: ListState::Idle,
            selected: None,
        }
    }

    pub fn state(&self) -> &ListState<T> {
        &self.state
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn items(&self) -> &[T] {
        match &self.state {
            ListState::Ready(items) => items,
            _ => &[],
        }
    }

    /// Only a loaded, non-empty list accepts a selection.
    pub fn is_enabled(&self) -> bool {
        matches!(&self.state, ListState::Ready(items) if !items.is_empty())
    }

    pub fn placeholder(&self) -> String {
        match &self.state {
            ListState::Idle => "Select semester and branch first".to_string(),
            ListState::Loading(_) => "Loading…".to_string(),
            ListState::Ready(items) if items.is_empty() => format!("No {} found", self.kind.noun()),
            ListState::Ready(_) => format!("All {}", capitalize(self.kind.noun())),
            ListState::Error => "Error".to_string(),
        }
    }

    /// Drop any selection and any in-flight load.
    fn reset(&mut self) {
        self.generation.next();
        self.state = ListState::Idle;
        self.selected = None;
    }

    fn start(&mut self) -> Ticket {
        let ticket = self.generation.next();
        self.state = ListState::Loading(ticket);
        self.selected = None;
        ticket
    }

    fn finish<E: fmt::Display>(
        &mut self,
        ticket: Ticket,
        result: std::result::Result<Vec<T>, E>,
    ) -> bool {
        let pending = matches!(self.state, ListState::Loading(t) if t == ticket);
        if !pending || !self.generation.is_current(ticket) {
            debug!("ignoring superseded {} load {:?}", self.kind.noun(), ticket);
            return false;
        }
        self.state = match result {
            Ok(items) => ListState::Ready(items),
            Err(e) => {
                debug!("{} load failed: {e}", self.kind.noun());
                ListState::Error
            }
        };
        true
    }

    fn select(&mut self, key: Option<&str>) -> Result<()> {
        let key = key.map(str::trim).filter(|k| !k.is_empty());
        let Some(key) = key else {
            self.selected = None;
            return Ok(());
        };
        if !self.is_enabled() {
            return Err(Error::precondition(format!(
                "{} list is not available ({})",
                self.kind.noun(),
                self.placeholder()
            )));
        }
        if !self.items().iter().any(|item| item.key() == key) {
            return Err(Error::precondition(format!(
                "'{key}' is not one of the loaded {}",
                self.kind.noun()
            )));
        }
        self.selected = Some(key.to_string());
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fetch the caller must perform; hand the result back with the ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadRequest {
    Subjects {
        ticket: Ticket,
        semester: u8,
        branch: String,
    },
    Rolls {
        ticket: Ticket,
        semester: u8,
        branch: String,
    },
}

#[derive(Clone, Debug)]
pub struct FilterCoordinator {
    semester: Option<u8>,
    branch: Option<String>,
    date: Option<NaiveDate>,
    subjects: DependentList<Subject>,
    rolls: DependentList<Student>,
    track_rolls: bool,
    required: Vec<Field>,
}

impl FilterCoordinator {
    /// `required` lists the fields the submit action needs. `track_rolls`
    /// makes semester/branch changes reload the roll list too.
    pub fn new(required: &[Field], track_rolls: bool) -> Self {
        Self {
            semester: None,
            branch: None,
            date: None,
            subjects: DependentList::new(ListKind::Subjects),
            rolls: DependentList::new(ListKind::Rolls),
            track_rolls,
            required: required.to_vec(),
        }
    }

    pub fn subjects(&self) -> &DependentList<Subject> {
        &self.subjects
    }

    pub fn rolls(&self) -> &DependentList<Student> {
        &self.rolls
    }

    pub fn set_semester(&mut self, semester: Option<u8>) -> Vec<LoadRequest> {
        self.semester = semester;
        self.reload_dependents()
    }

    pub fn set_branch(&mut self, branch: Option<&str>) -> Vec<LoadRequest> {
        self.branch = branch.map(normalize_branch).filter(|b| !b.is_empty());
        self.reload_dependents()
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
    }

    pub fn select_subject(&mut self, code: Option<&str>) -> Result<()> {
        self.subjects.select(code)
    }

    pub fn select_roll(&mut self, roll: Option<&str>) -> Result<()> {
        self.rolls.select(roll)
    }

    fn reload_dependents(&mut self) -> Vec<LoadRequest> {
        let (Some(semester), Some(branch)) = (self.semester, self.branch.clone()) else {
            self.subjects.reset();
            if self.track_rolls {
                self.rolls.reset();
            }
            return Vec::new();
        };
        let mut out = vec![LoadRequest::Subjects {
            ticket: self.subjects.start(),
            semester,
            branch: branch.clone(),
        }];
        if self.track_rolls {
            out.push(LoadRequest::Rolls {
                ticket: self.rolls.start(),
                semester,
                branch,
            });
        }
        out
    }

    pub fn subjects_loaded<E: fmt::Display>(
        &mut self,
        ticket: Ticket,
        result: std::result::Result<Vec<Subject>, E>,
    ) -> bool {
        self.subjects.finish(ticket, result)
    }

    /// Roll lists arrive per semester; only the selected branch is kept.
    pub fn rolls_loaded<E: fmt::Display>(
        &mut self,
        ticket: Ticket,
        result: std::result::Result<Vec<Student>, E>,
    ) -> bool {
        let branch = self.branch.clone().unwrap_or_default();
        let result = result.map(|students| {
            students
                .into_iter()
                .filter(|s| s.branch == branch)
                .collect::<Vec<_>>()
        });
        self.rolls.finish(ticket, result)
    }

    pub fn selection(&self) -> Selection {
        Selection {
            semester: self.semester,
            branch: self.branch.clone(),
            subject: self.subjects.selected().map(str::to_string),
            roll: self.rolls.selected().map(str::to_string),
            date: self.date,
        }
    }

    pub fn missing_fields(&self) -> Vec<Field> {
        let selection = self.selection();
        self.required
            .iter()
            .copied()
            .filter(|field| match field {
                Field::Semester => selection.semester.is_none(),
                Field::Branch => selection.branch.is_none(),
                Field::Subject => selection.subject.is_none(),
                Field::Roll => selection.roll.is_none(),
                Field::Date => selection.date.is_none(),
            })
            .collect()
    }

    /// The submit/start action is available only with every required field set.
    pub fn can_submit(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn require_complete(&self) -> Result<Selection> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            return Ok(self.selection());
        }
        let names = missing
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::precondition(format!("Please select: {names}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(code: &str) -> Subject {
        serde_json::from_value(serde_json::json!({"code": code, "name": code})).unwrap()
    }

    fn student(roll: &str, branch: &str) -> Student {
        serde_json::from_value(serde_json::json!({"roll": roll, "branch": branch})).unwrap()
    }

    fn subjects_ticket(requests: &[LoadRequest]) -> Ticket {
        requests
            .iter()
            .find_map(|r| match r {
                LoadRequest::Subjects { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .unwrap()
    }

    fn ready(coordinator: &mut FilterCoordinator) {
        coordinator.set_semester(Some(3));
        let requests = coordinator.set_branch(Some("cse"));
        assert!(coordinator.subjects_loaded(
            subjects_ticket(&requests),
            Ok::<_, Error>(vec![subject("CS1"), subject("CS2")])
        ));
    }

    #[test]
    fn semester_and_branch_trigger_subject_load() {
        let mut c = FilterCoordinator::new(&[Field::Semester, Field::Branch], false);
        assert!(c.set_semester(Some(2)).is_empty());
        assert_eq!(c.subjects().placeholder(), "Select semester and branch first");
        let requests = c.set_branch(Some(" ece "));
        assert_eq!(requests.len(), 1);
        assert!(matches!(
            &requests[0],
            LoadRequest::Subjects { semester: 2, branch, .. } if branch == "ECE"
        ));
        assert_eq!(c.subjects().placeholder(), "Loading…");
        assert!(!c.subjects().is_enabled());
    }

    #[test]
    fn clearing_semester_resets_populated_subject() {
        let mut c = FilterCoordinator::new(&[Field::Semester, Field::Subject], false);
        ready(&mut c);
        c.select_subject(Some("CS2")).unwrap();
        assert!(c.can_submit());

        c.set_semester(None);
        assert!(!c.subjects().is_enabled());
        assert_eq!(c.subjects().selected(), None);
        assert_eq!(c.subjects().placeholder(), "Select semester and branch first");
        assert!(!c.can_submit());
    }

    #[test]
    fn superseded_load_is_ignored() {
        let mut c = FilterCoordinator::new(&[], false);
        c.set_semester(Some(1));
        let first = subjects_ticket(&c.set_branch(Some("CSE")));
        let second = subjects_ticket(&c.set_semester(Some(2)));
        assert!(c.subjects_loaded(second, Ok::<_, Error>(vec![subject("MA2")])));
        assert!(!c.subjects_loaded(first, Ok::<_, Error>(vec![subject("MA1")])));
        assert_eq!(c.subjects().items()[0].code, "MA2");
    }

    #[test]
    fn failed_load_disables_with_error_placeholder() {
        let mut c = FilterCoordinator::new(&[], false);
        c.set_semester(Some(1));
        let t = subjects_ticket(&c.set_branch(Some("CSE")));
        assert!(c.subjects_loaded::<&str>(t, Err("boom")));
        assert_eq!(c.subjects().placeholder(), "Error");
        assert!(!c.subjects().is_enabled());
        assert!(c.select_subject(Some("CS1")).unwrap_err().is_precondition());
    }

    #[test]
    fn selections_are_not_restored_after_reload() {
        let mut c = FilterCoordinator::new(&[], false);
        ready(&mut c);
        c.select_subject(Some("CS1")).unwrap();
        let t = subjects_ticket(&c.set_branch(Some("CSE")));
        c.subjects_loaded(t, Ok::<_, Error>(vec![subject("CS1")]));
        assert_eq!(c.subjects().selected(), None);
    }

    #[test]
    fn subject_change_keeps_upstream() {
        let mut c = FilterCoordinator::new(&[], false);
        ready(&mut c);
        c.select_subject(Some("CS1")).unwrap();
        c.select_subject(Some("CS2")).unwrap();
        let sel = c.selection();
        assert_eq!(sel.semester, Some(3));
        assert_eq!(sel.branch.as_deref(), Some("CSE"));
        assert_eq!(sel.subject.as_deref(), Some("CS2"));
    }

    #[test]
    fn roll_list_follows_branch() {
        let mut c = FilterCoordinator::new(&[], true);
        c.set_semester(Some(3));
        let requests = c.set_branch(Some("CSE"));
        let roll_ticket = requests
            .iter()
            .find_map(|r| match r {
                LoadRequest::Rolls { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .unwrap();
        c.rolls_loaded(
            roll_ticket,
            Ok::<_, Error>(vec![student("1", "CSE"), student("2", "ECE")]),
        );
        assert_eq!(c.rolls().items().len(), 1);
        assert!(c.select_roll(Some("2")).is_err());
        c.select_roll(Some("1")).unwrap();
        assert_eq!(c.selection().roll.as_deref(), Some("1"));
    }

    #[test]
    fn missing_fields_are_named() {
        let mut c = FilterCoordinator::new(&[Field::Semester, Field::Date], false);
        c.set_semester(Some(4));
        let err = c.require_complete().unwrap_err();
        assert_eq!(err.user_message(), "Please select: date");
    }
}
