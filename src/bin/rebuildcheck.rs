//! rebuildcheck - reconcile waveform index files against their shadow and data
//!
//! ```bash
//! rebuildcheck [-dbg] [-fix] [--json] file1 [file2 ...]
//! ```
//!
//! Each argument names one file of a triple (or its stub); the extension is
//! stripped and `<stub>.idx`, `<stub>.chk` and `<stub>.ms` are opened. Without
//! `-fix` nothing is written. Exit status 2 means a file of some triple is
//! missing, 3 means a control block could not be read.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use waveform_index::{FileTriple, IndexError, RebuildCheck, RebuildConfig};

const EXIT_FILE_NOT_FOUND: u8 = 2;
const EXIT_CONTROL_BLOCK: u8 = 3;

/// Reconcile waveform index files
#[derive(Parser, Debug)]
#[command(name = "rebuildcheck")]
#[command(about = "Audit and repair .idx/.chk index files against raw data blocks")]
struct Args {
    /// Verbose per-block logging
    #[arg(long)]
    dbg: bool,

    /// Write repaired blocks back (default: dry run)
    #[arg(long)]
    fix: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Include per-block differences in the idx/chk audit
    #[arg(long)]
    detailed: bool,

    /// Files of the triples to check; extensions are ignored
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Accept the historical single-dash spellings of the long flags
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-dbg") => OsString::from("--dbg"),
            Some("-fix") => OsString::from("--fix"),
            Some("-json") => OsString::from("--json"),
            _ => arg,
        })
        .collect()
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
    let args = Args::parse_from(normalize_args(std::env::args_os()));
    init_tracing(args.dbg);

    let triples: Vec<FileTriple> = args.files.iter().map(FileTriple::from_path).collect();
    for triple in &triples {
        if let Err(e) = triple.ensure_exists() {
            eprintln!("rebuildcheck: {}", e);
            return ExitCode::from(EXIT_FILE_NOT_FOUND);
        }
    }

    let config = RebuildConfig::new().fix(args.fix).debug(args.dbg).detailed(args.detailed);
    info!(files = triples.len(), fix = args.fix, "Starting rebuildcheck");

    for triple in triples {
        let stub = triple.stub().display().to_string();
        let result = RebuildCheck::new(triple, config.clone()).and_then(|check| check.run());
        match result {
            Ok(report) if args.json => match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Cannot serialize report for {}: {}", stub, e),
            },
            Ok(report) => print!("{}", report.render()),
            Err(e @ IndexError::FileNotFound { .. }) => {
                eprintln!("rebuildcheck: {}", e);
                return ExitCode::from(EXIT_FILE_NOT_FOUND);
            }
            Err(e @ IndexError::ControlBlockUnreadable { .. }) => {
                eprintln!("rebuildcheck: {}", e);
                return ExitCode::from(EXIT_CONTROL_BLOCK);
            }
            Err(e) => error!("Aborted {}: {}", stub, e),
        }
    }

    ExitCode::SUCCESS
}
