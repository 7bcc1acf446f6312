//! Purpose: `mmapkit` CLI entry point for inspecting and patching file regions via the engine.
//! Role: Binary crate root; parses args, runs one command, emits JSON (or raw bytes) on stdout.
//! Invariants: Every file access goes through `api::MapEngine` (same path as the C ABI).
//! Invariants: Errors are emitted as JSON on stderr; exit code is the catalog code.
//! Invariants: Tracing goes to stderr and is filtered by `RUST_LOG` (default `warn`).
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

use mmapkit::api::{AccessMode, Error, ErrorCode, ErrorKind, MapEngine, to_error_code, version};

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

#[derive(Parser, Debug)]
#[command(
    name = "mmapkit",
    version,
    about = "Map file regions into memory and inspect or patch them",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Map a region and print its layout as JSON.
    Inspect {
        #[command(flatten)]
        region: RegionArgs,
        #[arg(long, help = "Map read-write instead of read-only")]
        write: bool,
    },
    /// Print the bytes of a mapped region.
    Read {
        #[command(flatten)]
        region: RegionArgs,
        #[arg(long, help = "Print lowercase hex instead of raw bytes")]
        hex: bool,
    },
    /// Copy bytes into a file through a read-write mapping, then sync.
    Write {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, default_value_t = 0, help = "Byte offset to write at")]
        offset: u64,
        #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
        text: Option<String>,
        #[arg(long, help = "Hex-encoded bytes to write")]
        hex: Option<String>,
    },
    /// List the error catalog.
    Errors,
    /// Print the library version.
    Version,
}

#[derive(Args, Debug)]
struct RegionArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    path: PathBuf,
    #[arg(long, default_value_t = 0, help = "Byte offset of the region")]
    offset: u64,
    #[arg(long, default_value_t = 0, help = "Region length in bytes (0 = to end of file)")]
    length: u64,
}

fn main() {
    let exit_code = match run(std::env::args_os()) {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_error_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run(args: impl IntoIterator<Item = OsString>) -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Unknown)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    to_error_code(ErrorKind::InvalidArgument)
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::InvalidArgument)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `mmapkit --help` for usage."));
            }
        },
    };

    init_tracing();
    let engine = MapEngine::new();
    let outcome = match cli.command {
        Command::Inspect { region, write } => {
            let mode = if write {
                AccessMode::ReadWrite
            } else {
                AccessMode::ReadOnly
            };
            let id = engine.create_from_path(&region.path, mode, region.offset, region.length)?;
            let mut value = serde_json::to_value(engine.info(id)?).map_err(json_error)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("is_open".to_string(), json!(engine.is_open(id)));
                obj.insert("is_mapped".to_string(), json!(engine.is_mapped(id)));
            }
            engine.destroy(id);
            emit_json(&value)?;
            RunOutcome::ok()
        }
        Command::Read { region, hex } => {
            let id = engine.create_from_path(
                &region.path,
                AccessMode::ReadOnly,
                region.offset,
                region.length,
            )?;
            let bytes = engine.data(id)?.to_vec();
            engine.destroy(id);
            let mut stdout = io::stdout().lock();
            let written = if hex {
                writeln!(stdout, "{}", hex::encode(&bytes))
            } else {
                stdout.write_all(&bytes)
            };
            written.and_then(|()| stdout.flush()).map_err(stdout_error)?;
            RunOutcome::ok()
        }
        Command::Write {
            path,
            offset,
            text,
            hex,
        } => {
            let bytes = match (text, hex) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(encoded)) => hex::decode(encoded.trim()).map_err(|err| {
                    Error::new(ErrorKind::InvalidArgument)
                        .with_message("invalid hex input")
                        .with_source(err)
                })?,
                (None, None) => {
                    return Err(Error::new(ErrorKind::InvalidArgument)
                        .with_message("nothing to write")
                        .with_hint("Pass --text or --hex."));
                }
            };
            if bytes.is_empty() {
                return Err(Error::new(ErrorKind::InvalidArgument).with_message("nothing to write"));
            }
            let id =
                engine.create_from_path(&path, AccessMode::ReadWrite, offset, bytes.len() as u64)?;
            engine.data_writable(id)?.write_at(0, &bytes)?;
            engine.sync(id)?;
            engine.destroy(id);
            emit_json(&json!({
                "path": path.display().to_string(),
                "offset": offset,
                "written": bytes.len(),
            }))?;
            RunOutcome::ok()
        }
        Command::Errors => {
            let entries: Vec<Value> = ErrorCode::ALL
                .iter()
                .map(|code| {
                    json!({
                        "code": code.as_i32(),
                        "kind": code.name(),
                        "message": code.message(),
                    })
                })
                .collect();
            emit_json(&Value::Array(entries))?;
            RunOutcome::ok()
        }
        Command::Version => {
            emit_json(&json!({ "version": version() }))?;
            RunOutcome::ok()
        }
    };
    engine.shutdown();
    Ok(outcome)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_json(value: &Value) -> Result<(), Error> {
    let json = serde_json::to_string(value).map_err(json_error)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}").map_err(stdout_error)
}

fn emit_error(err: &Error) {
    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Unknown\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.code().name()));
    inner.insert("code".to_string(), json!(err.code().as_i32()));
    inner.insert("message".to_string(), json!(err.to_string()));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
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

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn json_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Unknown)
        .with_message("json encode failed")
        .with_source(err)
}

fn stdout_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Unknown)
        .with_message("failed to write stdout")
        .with_source(err)
}
