//! Client-side reshaping of attendance data: grouping, column derivation,
//! report rows, filter cascades and bulk serialization. Nothing here performs
//! I/O.

pub mod bulk;
pub mod columns;
pub mod filters;
pub mod grouper;
pub mod identity;
pub mod report;
pub mod view;

pub use bulk::{apply_status_edits, build_bulk_request, BulkFilters, StatusRow};
pub use columns::derive_columns;
pub use filters::{Field, FilterCoordinator, LoadRequest, Selection};
pub use grouper::{group_records, AggregatedRow, GroupedAttendance};
pub use identity::{classify, is_record_identifier, resolve_delete_target, DeleteTarget};
pub use report::{
    build_report, build_roster, filter_students, select_subjects, Report, ReportParams,
    ReportRow, RosterParams, RosterRow,
};
pub use view::{Ticket, ViewModel, ViewSlot};
