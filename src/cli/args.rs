use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rollbook",
    version,
    about = "student attendance client",
    long_about = "Rollbook reads, aggregates and edits attendance kept by the attendance service.\n\nExamples:\n  rollbook branches\n  rollbook report --semester 3 --date 2024-08-01 --branch CSE\n  rollbook roster -s 3 -b CSE -j CS301 -d 2024-08-01\n  rollbook bulk -s 3 -b CSE -j CS301 -d 2024-08-01 --present 21CS01,21CS04\n  rollbook delete 65f0c0ffee65f0c0ffee65f0\n\nTip: Use --config to persist the service URL and default filters."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "color",
        visible_alias = "clr",
        global = true,
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "no-color",
        visible_alias = "nc",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        global = true,
        help_heading = "Output",
        help = "Write the rendered table (or exported spreadsheet) to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'F',
        long = "format",
        visible_alias = "output-format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text, json, html, or csv (inferred from --output when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.rollbook/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'u',
        long = "base-url",
        visible_alias = "url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Attendance service base URL."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Proxy URL for every request."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "header",
        value_name = "HEADER",
        global = true,
        help_heading = "HTTP",
        help = "Extra request header as 'Key: Value'."
    )]
    pub header: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Selections shared by the table views. Which ones are required depends on
/// the view.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(short = 's', long = "semester", value_name = "N", help = "Semester (1-8).")]
    pub semester: Option<u8>,

    #[arg(short = 'b', long = "branch", value_name = "BRANCH", help = "Branch, e.g. CSE.")]
    pub branch: Option<String>,

    #[arg(
        short = 'j',
        long = "subject",
        value_name = "CODE",
        help = "Subject code."
    )]
    pub subject: Option<String>,

    #[arg(short = 'd', long = "date", value_name = "YYYY-MM-DD", help = "Attendance date.")]
    pub date: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write a commented default config file if none exists.
    InitConfig,

    /// List the branches students are registered under.
    Branches,

    /// List subjects for a semester, optionally narrowed to a branch.
    Subjects {
        #[arg(short = 's', long = "semester", value_name = "N")]
        semester: Option<u8>,
        #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
        branch: Option<String>,
    },

    /// List students of a semester, optionally narrowed to a branch.
    Students {
        #[arg(short = 's', long = "semester", value_name = "N")]
        semester: Option<u8>,
        #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
        branch: Option<String>,
    },

    /// All attendance records grouped per student, one column per subject.
    Records {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Per-student status across subjects on one date, with percentage.
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(short = 'r', long = "roll", value_name = "ROLL")]
        roll: Option<String>,
    },

    /// Every student of a semester and branch with their status for one subject.
    Roster {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Edit roster statuses and submit the whole table in one request.
    Bulk {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(
            long = "present",
            value_name = "ROLLS",
            value_delimiter = ',',
            action = ArgAction::Append,
            help = "Mark these rolls present (comma-separated, repeatable)."
        )]
        present: Vec<String>,
        #[arg(
            long = "absent",
            value_name = "ROLLS",
            value_delimiter = ',',
            action = ArgAction::Append,
            help = "Mark these rolls absent (comma-separated, repeatable)."
        )]
        absent: Vec<String>,
        #[arg(long = "dry-run", help = "Print the request body instead of sending it.")]
        dry_run: bool,
    },

    /// Save one student's attendance for a subject and date.
    Mark {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(short = 'r', long = "roll", value_name = "ROLL")]
        roll: String,
        #[arg(long = "name", value_name = "NAME", help = "Looked up when omitted.")]
        name: Option<String>,
        #[arg(long = "status", value_name = "STATUS", default_value = "present")]
        status: String,
    },

    /// Add a subject to a branch and semester.
    AddSubject {
        #[arg(long = "code", value_name = "CODE")]
        code: String,
        #[arg(long = "name", value_name = "NAME")]
        name: String,
        #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
        branch: Option<String>,
        #[arg(short = 's', long = "semester", value_name = "N")]
        semester: Option<u8>,
    },

    /// Download the server-rendered spreadsheet for a date range.
    Export {
        #[arg(short = 's', long = "semester", value_name = "N")]
        semester: Option<u8>,
        #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
        branch: Option<String>,
        #[arg(short = 'j', long = "subject", value_name = "CODE", help = "Omit for all subjects.")]
        subject: Option<String>,
        #[arg(
            short = 't',
            long = "report-type",
            value_name = "TYPE",
            default_value = "daily",
            help = "daily, weekly, or monthly."
        )]
        report_type: String,
        #[arg(long = "start", value_name = "YYYY-MM-DD")]
        start: Option<String>,
        #[arg(long = "end", value_name = "YYYY-MM-DD")]
        end: Option<String>,
        #[arg(long = "exclude-present")]
        exclude_present: bool,
        #[arg(long = "exclude-absent")]
        exclude_absent: bool,
    },

    /// Register a student with a face image file.
    Register {
        #[arg(short = 'r', long = "roll", value_name = "ROLL")]
        roll: String,
        #[arg(long = "name", value_name = "NAME")]
        name: String,
        #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
        branch: Option<String>,
        #[arg(short = 's', long = "semester", value_name = "N")]
        semester: Option<u8>,
        #[arg(long = "image", value_name = "FILE")]
        image: String,
    },

    /// Ask the service to start a recognition session for a class.
    StartSession {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long = "timing", value_name = "SLOT", help = "Lecture slot, e.g. 10:00-11:00.")]
        timing: Option<String>,
    },

    /// Delete one record (24 hex-digit id) or every record of a roll number.
    Delete {
        #[arg(value_name = "TARGET")]
        target: String,
    },
}
