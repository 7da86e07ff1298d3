//! collar-filter: split a wildlife-tracking-collar CSV export into per-tag files.
//!
//! Any input not given as a flag is asked for interactively, picking files
//! from the current directory.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use collar_filter::commands::{run_filter, select_file, select_max_lines, Prompter};
use collar_filter::config::WriterConfig;
use collar_filter::error::AppError;
use collar_filter::streaming::DemuxSummary;
use collar_filter::validation::{load_valid_keys, resolve_key_column, InputSource};

/// Filter collar records into per-tag CSV files.
#[derive(Parser, Debug)]
#[command(name = "collar-filter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file with the raw collar records.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// CSV file whose first line lists the valid tag IDs.
    #[arg(short, long)]
    valid_keys: Option<PathBuf>,

    /// Column holding the tag ID to filter on.
    #[arg(short, long)]
    key_column: Option<String>,

    /// Maximum data rows per output file (0 = no limit).
    #[arg(short, long)]
    max_lines: Option<u64>,

    /// Directory under which output is written.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Write files directly into the output directory instead of one directory per tag.
    #[arg(long)]
    flat: bool,

    /// Extension of the files offered in interactive selection ("" for all files).
    #[arg(long, default_value = ".csv")]
    extension: String,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    summary_json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&args) {
        Ok(summary) => {
            if args.summary_json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Failed to encode summary: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!("Run failed: {:?}", e);
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Collects any missing inputs, then performs the run.
fn run(args: &Args) -> Result<DemuxSummary, AppError> {
    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let search_dir = Path::new(".");

    let input = match &args.input {
        Some(path) => path.clone(),
        None => PathBuf::from(select_file(
            &mut prompter,
            search_dir,
            &args.extension,
            "Please select the csv file containing raw tags data",
        )?),
    };

    let valid_keys_path = match &args.valid_keys {
        Some(path) => path.clone(),
        None => PathBuf::from(select_file(
            &mut prompter,
            search_dir,
            &args.extension,
            "Please select the csv file containing valid tag IDs",
        )?),
    };
    let keys = load_valid_keys(&valid_keys_path)?;

    let max_lines = match args.max_lines {
        Some(n) => n,
        None => select_max_lines(&mut prompter)?,
    };

    let source = InputSource::open(&input)?;
    let key_column = match &args.key_column {
        Some(column) => {
            resolve_key_column(source.header(), column)?;
            column.clone()
        }
        None => select_column(&mut prompter, &source)?,
    };

    let config = WriterConfig::default()
        .max_lines(max_lines)
        .with_dir(!args.flat)
        .output_root(&args.output_dir);

    run_filter(source, &key_column, &keys, &config)
}

fn select_column<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    source: &InputSource,
) -> Result<String, AppError> {
    prompter
        .select(
            "Please select the column which contains tag IDs to filter on",
            &source.column_names(),
            false,
        )?
        .ok_or(AppError::InputAborted)
}

/// Prints an error for the operator.
fn report(error: &AppError) {
    let presentation = error.to_presentation();
    eprintln!("error: {}", presentation.title);
    eprintln!("  {}", presentation.message);
    if let Some(action) = presentation.action {
        eprintln!("  hint: {}", action);
    }
}
