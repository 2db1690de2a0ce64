use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use chrono::NaiveDate;
use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, LevelFilter};

use crate::api::{ApiClient, ClientOptions, DEFAULT_BASE_URL};
use crate::cli::args::{CliArgs, Command, FilterArgs};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::engine::filters::ListState;
use crate::engine::{
    apply_status_edits, build_bulk_request, build_report, build_roster, derive_columns,
    filter_students, group_records, resolve_delete_target, select_subjects, BulkFilters,
    DeleteTarget, Field, FilterCoordinator, LoadRequest, ReportParams, RosterParams, RosterRow,
    Selection, ViewModel, ViewSlot,
};
use crate::error::{Error, Result};
use crate::model::{
    normalize_branch, AddSubjectRequest, AttendanceRecord, AttendanceStatus,
    FilteredReportRequest, RegisterRequest, ReportType, SaveAttendanceRequest,
    StartSessionRequest, Student, Subject,
};
use crate::output::{self, OutputFormat, Table};

struct RunConfig {
    client: ClientOptions,
    no_color: bool,
    output: Option<String>,
    output_format: OutputFormat,
    default_branch: Option<String>,
    default_semester: Option<u8>,
    command: Command,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let base_url = args
        .base_url
        .or(cfg.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let header = args.header.or(cfg.header).filter(|h| !h.trim().is_empty());

    let output = args.output.filter(|o| !o.trim().is_empty());
    let format_raw = args.output_format.or(cfg.output_format);
    let output_format = match format_raw.as_deref() {
        Some(raw) => OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid output_format '{raw}'"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    let default_semester = cfg.semester;
    validation::check_semester(default_semester)
        .map_err(|e| format!("invalid config semester: {e}"))?;

    Ok(RunConfig {
        client: ClientOptions {
            base_url,
            timeout_seconds: timeout,
            proxy,
            header,
        },
        no_color,
        output,
        output_format,
        default_branch: cfg.branch.map(|b| normalize_branch(&b)).filter(|b| !b.is_empty()),
        default_semester,
        command: args.command,
    })
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template(":: {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message.to_string());
    pb
}

fn report_ok(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
}

fn report_err(message: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), message);
}

/// Filter values after applying config defaults and parsing the date.
fn effective_filters(run: &RunConfig, filters: &FilterArgs) -> Result<(Selection, Option<NaiveDate>)> {
    let date = validation::parse_optional_date(filters.date.as_deref(), "--date")
        .map_err(Error::precondition)?;
    let selection = Selection {
        semester: filters.semester.or(run.default_semester),
        branch: filters
            .branch
            .as_deref()
            .map(normalize_branch)
            .filter(|b| !b.is_empty())
            .or_else(|| run.default_branch.clone()),
        subject: filters
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        roll: None,
        date,
    };
    Ok((selection, date))
}

enum Loaded {
    Subjects(crate::engine::Ticket, Result<Vec<Subject>>),
    Rolls(crate::engine::Ticket, Result<Vec<Student>>),
}

/// Drives the cascading selects: semester and branch load the subject (and
/// optionally roll) lists, then the requested subject/roll must be one of the
/// loaded entries.
async fn resolve_selection(
    api: &ApiClient,
    requested: &Selection,
    roll: Option<&str>,
    required: &[Field],
) -> Result<Selection> {
    let mut coordinator = FilterCoordinator::new(required, roll.is_some());
    coordinator.set_date(requested.date);
    coordinator.set_semester(requested.semester);
    let requests = coordinator.set_branch(requested.branch.as_deref());

    let loads = requests.into_iter().map(|request| async move {
        match request {
            LoadRequest::Subjects {
                ticket,
                semester,
                branch,
            } => Loaded::Subjects(
                ticket,
                api.subjects_by_semester_and_branch(semester, &branch).await,
            ),
            LoadRequest::Rolls {
                ticket, semester, ..
            } => Loaded::Rolls(ticket, api.students_by_semester(semester).await),
        }
    });

    let mut load_error: Option<Error> = None;
    for loaded in join_all(loads).await {
        match loaded {
            Loaded::Subjects(ticket, result) => {
                let result = result.map_err(|e| {
                    let text = e.user_message();
                    load_error.get_or_insert(e);
                    text
                });
                coordinator.subjects_loaded(ticket, result);
            }
            Loaded::Rolls(ticket, result) => {
                let result = result.map_err(|e| {
                    let text = e.user_message();
                    load_error.get_or_insert(e);
                    text
                });
                coordinator.rolls_loaded(ticket, result);
            }
        }
    }

    let lists_failed = matches!(coordinator.subjects().state(), ListState::Error)
        || matches!(coordinator.rolls().state(), ListState::Error);
    let selected = coordinator
        .select_subject(requested.subject.as_deref())
        .and_then(|_| coordinator.select_roll(roll));
    if let Err(e) = selected {
        return Err(match load_error {
            Some(load) if lists_failed => load,
            _ => e,
        });
    }
    debug!("subjects: {}", coordinator.subjects().placeholder());
    coordinator.require_complete()
}

async fn emit_table(run: &RunConfig, table: &Table, json: Vec<u8>, empty: &str) -> Result<()> {
    let rendered = match run.output_format {
        OutputFormat::Text => output::render_text(table, empty),
        OutputFormat::Json => json,
        OutputFormat::Html => output::render_html(table),
        OutputFormat::Csv => output::render_csv(table),
    };
    match run.output.as_deref() {
        Some(path) => {
            let path = config::expand_tilde(path);
            tokio::fs::write(&path, &rendered)
                .await
                .map_err(|e| Error::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
            report_ok(&format!("wrote {} row(s) to {}", table.rows.len(), path.display()));
        }
        None => {
            use std::io::Write as _;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&rendered)
                .and_then(|_| stdout.flush())
                .map_err(|e| Error::Io {
                    path: "<stdout>".to_string(),
                    source: e,
                })?;
        }
    }
    Ok(())
}

fn record_matches(record: &AttendanceRecord, selection: &Selection) -> bool {
    selection
        .semester
        .map_or(true, |s| record.semester == Some(s))
        && selection
            .branch
            .as_deref()
            .map_or(true, |b| normalize_branch(&record.branch) == b)
        && selection
            .subject
            .as_deref()
            .map_or(true, |s| record.subject_code == s)
        && selection.date.map_or(true, |d| record.date == Some(d))
}

async fn run_records(run: &RunConfig, api: &ApiClient, filters: &FilterArgs) -> Result<()> {
    let (selection, _) = effective_filters(run, filters)?;
    let mut view: ViewSlot<ViewModel<Vec<AttendanceRecord>>> = ViewSlot::default();
    let ticket = view.begin();

    let pb = spinner("Loading…");
    let fetched = api.all_records().await;
    pb.finish_and_clear();
    let records = fetched?
        .into_iter()
        .filter(|r| record_matches(r, &selection))
        .collect::<Vec<_>>();
    view.commit(ticket, ViewModel::new(selection, records));

    let Some(model) = view.take() else {
        return Ok(());
    };
    let grouped = group_records(&model.rows);
    let columns = derive_columns(&grouped);
    info!(
        "{} record(s) grouped into {} student(s) across {} subject(s)",
        model.rows.len(),
        grouped.len(),
        columns.len()
    );
    let table = output::grouped_table(&grouped, &columns);
    emit_table(run, &table, output::render_json(&grouped), "No attendance records found").await
}

async fn run_report(
    run: &RunConfig,
    api: &ApiClient,
    filters: &FilterArgs,
    roll: Option<&str>,
) -> Result<()> {
    let (mut selection, _) = effective_filters(run, filters)?;
    selection.roll = roll.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string);
    let params = ReportParams::from_selection(&selection)?;

    let mut view = ViewSlot::default();
    let ticket = view.begin();

    let pb = spinner("Loading…");
    let fetched = futures::try_join!(
        api.students_by_semester(params.semester),
        api.subjects_by_semester(params.semester),
        api.records(params.date, params.semester, None),
    );
    pb.finish_and_clear();
    let (students, subjects, records) = fetched?;

    let students = filter_students(&students, params.branch.as_deref(), params.roll.as_deref());
    let columns = select_subjects(&subjects, params.subject.as_deref());
    let report = build_report(&students, &columns, &records, params.date);
    view.commit(ticket, ViewModel::new(selection, report));

    let Some(model) = view.take() else {
        return Ok(());
    };
    let table = output::report_table(&model.rows);
    emit_table(run, &table, output::render_json(&model.rows), "No data found").await
}

const ROSTER_FIELDS: [Field; 4] = [Field::Semester, Field::Branch, Field::Subject, Field::Date];

async fn load_roster(api: &ApiClient, selection: &Selection) -> Result<Vec<RosterRow>> {
    let params = RosterParams::from_selection(selection)?;
    let pb = spinner("Loading…");
    let fetched = futures::try_join!(
        api.all_students(),
        api.records(params.date, params.semester, Some(&params.subject)),
    );
    pb.finish_and_clear();
    let (students, records) = fetched?;
    Ok(build_roster(&students, &records, &params))
}

/// Roster rows for the requested selection, with every filter required
/// before anything is fetched.
async fn resolve_roster(
    run: &RunConfig,
    api: &ApiClient,
    filters: &FilterArgs,
) -> Result<ViewModel<Vec<RosterRow>>> {
    let (requested, _) = effective_filters(run, filters)?;
    RosterParams::from_selection(&requested)?;
    let selection = resolve_selection(api, &requested, None, &ROSTER_FIELDS).await?;

    let mut view = ViewSlot::default();
    let ticket = view.begin();
    let rows = load_roster(api, &selection).await?;
    view.commit(ticket, ViewModel::new(selection.clone(), rows));
    Ok(view
        .take()
        .unwrap_or_else(|| ViewModel::new(selection, Vec::new())))
}

async fn emit_roster(run: &RunConfig, model: &ViewModel<Vec<RosterRow>>) -> Result<()> {
    let table = output::roster_table(&model.rows);
    emit_table(run, &table, output::render_json(&model.rows), "No students found").await
}

async fn run_bulk(
    run: &RunConfig,
    api: &ApiClient,
    filters: &FilterArgs,
    present: &[String],
    absent: &[String],
    dry_run: bool,
) -> Result<()> {
    let model = resolve_roster(run, api, filters).await?;
    let edited = ViewModel::new(
        model.selection.clone(),
        apply_status_edits(&model.rows, present, absent)?,
    );
    let bulk_filters = BulkFilters::from_selection(&edited.selection)?;
    let request = build_bulk_request(&edited.rows, &bulk_filters)?;

    if dry_run {
        let body = serde_json::to_string_pretty(&request).map_err(|e| Error::Malformed {
            endpoint: "/mark/bulk".to_string(),
            source: e,
        })?;
        println!("{body}");
        return Ok(());
    }

    let present_count = request
        .attendance
        .iter()
        .filter(|e| e.status.is_present())
        .count();
    info!(
        "submitting {} row(s), {} present",
        request.attendance.len(),
        present_count
    );
    let message = api.bulk_upsert(&request).await?;
    report_ok(message.as_deref().unwrap_or("Attendance saved."));

    let refreshed = load_roster(api, &edited.selection).await?;
    emit_roster(run, &ViewModel::new(edited.selection, refreshed)).await
}

async fn run_mark(
    run: &RunConfig,
    api: &ApiClient,
    filters: &FilterArgs,
    roll: &str,
    name: Option<&str>,
    status: AttendanceStatus,
) -> Result<()> {
    let (mut requested, date) = effective_filters(run, filters)?;
    if date.is_none() {
        requested.date = Some(chrono::Local::now().date_naive());
    }
    let roll = roll.trim();
    if roll.is_empty() {
        return Err(Error::precondition("Please fill in all required fields."));
    }
    let selection = resolve_selection(
        api,
        &requested,
        Some(roll),
        &[
            Field::Semester,
            Field::Branch,
            Field::Subject,
            Field::Roll,
            Field::Date,
        ],
    )
    .await?;
    let (Some(semester), Some(branch), Some(subject), Some(date)) = (
        selection.semester,
        selection.branch.clone(),
        selection.subject.clone(),
        selection.date,
    ) else {
        return Err(Error::precondition("Please fill in all required fields."));
    };

    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => match api.student_lookup(roll, &branch, semester).await? {
            Some(student) if !student.name.is_empty() => student.name,
            _ => return Err(Error::precondition("Student not found")),
        },
    };

    let request = SaveAttendanceRequest {
        roll: roll.to_string(),
        roll_no: roll.to_string(),
        name,
        semester,
        branch,
        subject_code: subject,
        date,
        status,
    };
    let message = api.save_attendance(&request).await?;
    report_ok(message.as_deref().unwrap_or("Attendance saved successfully!"));
    Ok(())
}

async fn run_export(
    run: &RunConfig,
    api: &ApiClient,
    request: FilteredReportRequest,
) -> Result<()> {
    let pb = spinner("Generating report…");
    let fetched = api.generate_filtered_report(&request).await;
    pb.finish_and_clear();
    let bytes = fetched?;

    let path = match run.output.as_deref() {
        Some(path) => config::expand_tilde(path),
        None => PathBuf::from(export_file_name(
            request.report_type,
            chrono::Local::now().date_naive(),
        )),
    };
    tokio::fs::write(&path, &bytes).await.map_err(|e| Error::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    report_ok(&format!("saved {} byte(s) to {}", bytes.len(), path.display()));
    Ok(())
}

fn export_file_name(report_type: ReportType, today: NaiveDate) -> String {
    format!(
        "attendance_{}_{}.xlsx",
        report_type.as_str(),
        today.format("%Y-%m-%d")
    )
}

fn require_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn image_data_url(path: &str) -> Result<String> {
    let path = config::expand_tilde(path);
    let bytes = tokio::fs::read(&path).await.map_err(|e| Error::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    if bytes.is_empty() {
        return Err(Error::precondition("Please capture your photo first."));
    }
    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

async fn run_command(run: &RunConfig, api: &ApiClient) -> Result<()> {
    match &run.command {
        Command::InitConfig => Ok(()),
        Command::Branches => {
            let pb = spinner("Loading…");
            let fetched = api.branches().await;
            pb.finish_and_clear();
            let branches = fetched?;
            let table = output::branches_table(&branches);
            emit_table(run, &table, output::render_json(&branches), "No branches found").await
        }
        Command::Subjects { semester, branch } => {
            let semester = semester
                .or(run.default_semester)
                .ok_or_else(|| Error::precondition("Please select a semester."))?;
            let branch = require_text(branch.as_deref()).or_else(|| run.default_branch.clone());
            let pb = spinner("Loading…");
            let fetched = match branch.as_deref() {
                Some(branch) => api.subjects_by_semester_and_branch(semester, branch).await,
                None => api.subjects_by_semester(semester).await,
            };
            pb.finish_and_clear();
            let subjects = fetched?;
            let table = output::subjects_table(&subjects);
            emit_table(run, &table, output::render_json(&subjects), "No subjects found").await
        }
        Command::Students { semester, branch } => {
            let semester = semester
                .or(run.default_semester)
                .ok_or_else(|| Error::precondition("Please select a semester."))?;
            let branch = require_text(branch.as_deref()).or_else(|| run.default_branch.clone());
            let pb = spinner("Loading…");
            let fetched = api.students_by_semester(semester).await;
            pb.finish_and_clear();
            let students = filter_students(&fetched?, branch.as_deref(), None);
            let table = output::students_table(&students);
            emit_table(run, &table, output::render_json(&students), "No students found").await
        }
        Command::Records { filters } => run_records(run, api, filters).await,
        Command::Report { filters, roll } => run_report(run, api, filters, roll.as_deref()).await,
        Command::Roster { filters } => {
            let model = resolve_roster(run, api, filters).await?;
            emit_roster(run, &model).await
        }
        Command::Bulk {
            filters,
            present,
            absent,
            dry_run,
        } => run_bulk(run, api, filters, present, absent, *dry_run).await,
        Command::Mark {
            filters,
            roll,
            name,
            status,
        } => {
            let status = validation::parse_status(status).map_err(Error::precondition)?;
            run_mark(run, api, filters, roll, name.as_deref(), status).await
        }
        Command::AddSubject {
            code,
            name,
            branch,
            semester,
        } => {
            let branch = require_text(branch.as_deref())
                .map(|b| normalize_branch(&b))
                .or_else(|| run.default_branch.clone());
            let semester = semester.or(run.default_semester);
            let (Some(code), Some(name), Some(branch), Some(semester)) = (
                require_text(Some(code.as_str())),
                require_text(Some(name.as_str())),
                branch,
                semester,
            ) else {
                return Err(Error::precondition("All fields are required."));
            };
            let request = AddSubjectRequest {
                code,
                name,
                branch,
                semester,
            };
            let message = api.add_subject(&request).await?;
            report_ok(message.as_deref().unwrap_or("Subject added successfully!"));
            Ok(())
        }
        Command::Export {
            semester,
            branch,
            subject,
            report_type,
            start,
            end,
            exclude_present,
            exclude_absent,
        } => {
            let branch = require_text(branch.as_deref())
                .map(|b| normalize_branch(&b))
                .or_else(|| run.default_branch.clone());
            let start = validation::parse_optional_date(start.as_deref(), "--start")
                .map_err(Error::precondition)?;
            let end = validation::parse_optional_date(end.as_deref(), "--end")
                .map_err(Error::precondition)?;
            let (Some(semester), Some(branch), Some(report_type), Some(start_date), Some(end_date)) = (
                semester.or(run.default_semester),
                branch,
                ReportType::parse(report_type),
                start,
                end,
            ) else {
                return Err(Error::precondition("Please fill all required fields."));
            };
            if start_date > end_date {
                return Err(Error::precondition("Start date cannot be after end date."));
            }
            let request = FilteredReportRequest {
                semester,
                branch,
                subject: require_text(subject.as_deref()).unwrap_or_default(),
                report_type,
                start_date,
                end_date,
                include_present: !*exclude_present,
                include_absent: !*exclude_absent,
            };
            run_export(run, api, request).await
        }
        Command::Register {
            roll,
            name,
            branch,
            semester,
            image,
        } => {
            let branch = require_text(branch.as_deref())
                .map(|b| normalize_branch(&b))
                .or_else(|| run.default_branch.clone());
            let (Some(roll_no), Some(name), Some(branch), Some(semester)) = (
                require_text(Some(roll.as_str())),
                require_text(Some(name.as_str())),
                branch,
                semester.or(run.default_semester),
            ) else {
                return Err(Error::precondition("Please fill in all fields."));
            };
            let request = RegisterRequest {
                roll_no,
                name,
                branch,
                semester,
                face_image: image_data_url(image).await?,
            };
            let message = api.register(&request).await?;
            report_ok(message.as_deref().unwrap_or("Student registered successfully!"));
            Ok(())
        }
        Command::StartSession { filters, timing } => {
            let (mut requested, _) = effective_filters(run, filters)?;
            requested.date = Some(chrono::Local::now().date_naive());
            let Some(timing) = require_text(timing.as_deref()) else {
                return Err(Error::precondition("Please select: timing"));
            };
            let selection = resolve_selection(
                api,
                &requested,
                None,
                &[Field::Semester, Field::Branch, Field::Subject],
            )
            .await?;
            let (Some(semester), Some(branch), Some(subject_code), Some(date)) = (
                selection.semester,
                selection.branch,
                selection.subject,
                selection.date,
            ) else {
                return Err(Error::precondition("Please fill in all fields"));
            };
            let request = StartSessionRequest {
                subject_code,
                semester,
                branch,
                timing,
                date,
            };
            let response = api.start_session(&request).await?;
            report_ok(
                response
                    .message
                    .as_deref()
                    .unwrap_or("Attendance process started successfully!"),
            );
            if let Some(file) = response.excel_file.filter(|f| !f.trim().is_empty()) {
                println!(":: {:<10}: {}", "Sheet", file);
            }
            Ok(())
        }
        Command::Delete { target } => {
            let target = resolve_delete_target(Some(target.as_str()))?;
            let fallback = match &target {
                DeleteTarget::SingleRecord(_) => "Record deleted successfully.".to_string(),
                DeleteTarget::RollNumber(roll) => {
                    info!("deleting every record of roll {roll}; the roll is not checked against the roster");
                    format!("All records for Roll No {roll} deleted.")
                }
            };
            let message = api.delete(&target).await?;
            report_ok(message.as_deref().unwrap_or(&fallback));
            Ok(())
        }
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    let api = ApiClient::new(&run.client).map_err(|e| e.user_message())?;
    info!("using attendance service at {}", api.base_url());

    run_command(&run, &api).await.map_err(|e| {
        debug!("command failed: {e}");
        let message = e.user_message();
        report_err(&message);
        message
    })
}

fn init_config(path: Option<&str>) -> Result<(), String> {
    let path = match path {
        Some(p) => config::expand_tilde(p),
        None => config::default_config_path()
            .ok_or_else(|| "could not determine home directory".to_string())?,
    };
    if config::ensure_default_config_file(&path)? {
        report_ok(&format!("wrote {}", path.display()));
    } else {
        report_ok(&format!("{} already exists", path.display()));
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                print!("{e}");
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };
    init_logging(args.verbose);

    if matches!(args.command, Command::InitConfig) {
        return init_config(args.config.as_deref());
    }

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let args = CliArgs::parse_from([
            "rollbook",
            "--base-url",
            "http://api.local:9000",
            "branches",
        ]);
        let cfg = ConfigFile {
            base_url: Some("http://ignored".to_string()),
            timeout: Some(3),
            branch: Some(" ece ".to_string()),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg).unwrap();
        assert_eq!(run.client.base_url, "http://api.local:9000");
        assert_eq!(run.client.timeout_seconds, 3);
        assert_eq!(run.default_branch.as_deref(), Some("ECE"));
        assert_eq!(run.output_format, OutputFormat::Text);
    }

    #[test]
    fn format_is_inferred_from_output_path() {
        let args = CliArgs::parse_from(["rollbook", "-o", "out.csv", "branches"]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        assert_eq!(run.output_format, OutputFormat::Csv);
        assert_eq!(run.client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn color_flag_beats_config_no_color() {
        let args = CliArgs::parse_from(["rollbook", "--color", "branches"]);
        let cfg = ConfigFile {
            no_color: Some(true),
            ..ConfigFile::default()
        };
        assert!(!build_run_config(args, cfg).unwrap().no_color);
    }

    #[test]
    fn config_filters_fill_missing_selection() {
        let args = CliArgs::parse_from(["rollbook", "roster", "-j", " CS301 "]);
        let cfg = ConfigFile {
            semester: Some(5),
            branch: Some("cse".to_string()),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg).unwrap();
        let Command::Roster { filters } = &run.command else {
            panic!("expected roster");
        };
        let (selection, date) = effective_filters(&run, filters).unwrap();
        assert_eq!(selection.semester, Some(5));
        assert_eq!(selection.branch.as_deref(), Some("CSE"));
        assert_eq!(selection.subject.as_deref(), Some("CS301"));
        assert!(date.is_none());
    }

    #[test]
    fn export_file_name_uses_type_and_day() {
        let day = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        assert_eq!(
            export_file_name(ReportType::Weekly, day),
            "attendance_weekly_2024-09-03.xlsx"
        );
    }

    #[tokio::test]
    async fn failed_record_fetch_aborts_the_report() {
        let mut server = mockito::Server::new_async().await;
        let _students = server
            .mock("GET", "/students/getbysemester/3")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"roll_no":"1","name":"Asha","branch":"CSE","semester":3}]"#)
            .create_async()
            .await;
        let _subjects = server
            .mock("GET", "/subjects/getbysemester/3")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"code":"CS1","name":"Networks"}]"#)
            .create_async()
            .await;
        let _records = server
            .mock("GET", "/mark/get")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"database unavailable"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        let url = server.url();
        let args = CliArgs::parse_from([
            "rollbook",
            "--base-url",
            url.as_str(),
            "-o",
            out.to_str().unwrap(),
            "report",
            "-s",
            "3",
            "-d",
            "2024-08-01",
        ]);
        let run = build_run_config(args, ConfigFile::default()).unwrap();
        let api = ApiClient::new(&run.client).unwrap();
        let Command::Report { filters, roll } = &run.command else {
            panic!("expected report");
        };

        let err = run_report(&run, &api, filters, roll.as_deref())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Server { status: 500, .. }));
        assert_eq!(err.user_message(), "database unavailable");
        assert!(!out.exists());
    }

    fn roster_selection(subject: &str) -> Selection {
        Selection {
            semester: Some(3),
            branch: Some("CSE".to_string()),
            subject: Some(subject.to_string()),
            roll: None,
            date: NaiveDate::from_ymd_opt(2024, 8, 1),
        }
    }

    fn client_for(url: String) -> ApiClient {
        ApiClient::new(&ClientOptions {
            base_url: url,
            ..ClientOptions::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn failed_subject_load_is_reported_over_selection() {
        let mut server = mockito::Server::new_async().await;
        let _subjects = server
            .mock("GET", "/subjects/getbysemesterandbranch/3/CSE")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"subjects unavailable"}"#)
            .create_async()
            .await;

        let err = resolve_selection(
            &client_for(server.url()),
            &roster_selection("CS1"),
            None,
            &ROSTER_FIELDS,
        )
        .await
        .unwrap_err();
        assert!(!err.is_precondition());
        assert_eq!(err.user_message(), "subjects unavailable");
    }

    #[tokio::test]
    async fn unknown_subject_is_a_selection_error() {
        let mut server = mockito::Server::new_async().await;
        let _subjects = server
            .mock("GET", "/subjects/getbysemesterandbranch/3/CSE")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"code":"CS1","name":"Networks"}]"#)
            .create_async()
            .await;
        let api = client_for(server.url());

        let err = resolve_selection(&api, &roster_selection("CS9"), None, &ROSTER_FIELDS)
            .await
            .unwrap_err();
        assert!(err.is_precondition());

        let selection = resolve_selection(&api, &roster_selection("CS1"), None, &ROSTER_FIELDS)
            .await
            .unwrap();
        assert_eq!(selection.subject.as_deref(), Some("CS1"));
    }

    #[test]
    fn invalid_config_semester_is_rejected() {
        let args = CliArgs::parse_from(["rollbook", "branches"]);
        let cfg = ConfigFile {
            semester: Some(12),
            ..ConfigFile::default()
        };
        assert!(build_run_config(args, cfg).is_err());
    }
}
