//! Purpose: `pircodec` CLI entry point.
//! Role: Binary crate root; parses args, installs logging, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (JSON summaries or JSON Lines rows).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod ingest;
mod notice;

use notice::{Notice, notice_json};
use pircodec::api::{Error, ErrorKind, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `pircodec --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;

    command_dispatch::dispatch_command(cli.command, color_mode)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "pircodec",
    version,
    about = "Encode tabular rows into fixed 256-byte PIR records and back",
    long_about = None,
    after_help = r#"EXAMPLES
  $ printf '[42, 3.14, "hello"]\n[123, 2.71, "world"]\n' | pircodec encode -o table.pir
  $ pircodec decode -i table.pir
  $ pircodec inspect -i table.pir
  $ pircodec schema int,float,text

LOGGING
  Set RUST_LOG (e.g. RUST_LOG=debug) to see codec diagnostics on stderr."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ErrorPolicyCli {
    Stop,
    Skip,
}

impl From<ErrorPolicyCli> for ingest::ErrorPolicy {
    fn from(value: ErrorPolicyCli) -> Self {
        match value {
            ErrorPolicyCli::Stop => ingest::ErrorPolicy::Stop,
            ErrorPolicyCli::Skip => ingest::ErrorPolicy::Skip,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RowFormat {
    Array,
    Object,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Encode a JSON Lines table into a container file",
        long_about = r#"Read one row per line (a JSON array, or an object keyed by column) and write
a container: a 256-byte header block followed by one 256-byte record per row."#
    )]
    Encode {
        #[arg(
            short,
            long,
            help = "Input JSON Lines file (default: stdin)",
            value_hint = ValueHint::FilePath
        )]
        input: Option<PathBuf>,
        #[arg(short, long, help = "Output container file", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(long, help = "Comma-separated field kinds, e.g. int,float,text (default: first row)")]
        schema: Option<String>,
        #[arg(long, value_delimiter = ',', help = "Comma-separated column names")]
        columns: Option<Vec<String>>,
        #[arg(long, value_enum, default_value = "stop", help = "On a bad row: stop|skip")]
        errors: ErrorPolicyCli,
    },
    #[command(about = "Decode a container file into JSON Lines rows")]
    Decode {
        #[arg(short, long, help = "Input container file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "stop", help = "On a bad row: stop|skip")]
        errors: ErrorPolicyCli,
        #[arg(long, value_enum, default_value = "array", help = "Row shape: array|object")]
        format: RowFormat,
    },
    #[command(about = "Describe a container's header and per-row payload layout")]
    Inspect {
        #[arg(short, long, help = "Input container file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },
    #[command(about = "Parse a schema and show its type hints and text budget")]
    Schema {
        #[arg(help = "Comma-separated field kinds, e.g. int,float,text")]
        kinds: String,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() || err.kind() != ErrorKind::Io {
        return err;
    }
    err.with_hint("I/O error. Check the path, filesystem, and disk space.")
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::CorruptHeader || err.hint().is_some() {
        return err;
    }
    err.with_hint("Input does not look like a pircodec container. Re-encode it from the source table.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_line(value: &Value) {
    let json = serde_json::to_string(value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {}", notice.message);
        return;
    }
    let json = serde_json::to_string(&notice_json(notice))
        .unwrap_or_else(|_| "{\"notice\":{\"kind\":\"internal\"}}".to_string());
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        causes.push(source.to_string());
        current = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(row) = err.row() {
        inner.insert("row".to_string(), json!(row));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(row) = err.row() {
        lines.push(format!(
            "{} {row}",
            colorize_label("row:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(field) = err.field() {
        lines.push(format!(
            "{} {field}",
            colorize_label("field:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
