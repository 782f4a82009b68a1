//! dupescan - concurrent duplicate file finder
//!
//! Walks a directory tree on a bounded worker pool, fingerprints every file
//! from per-chunk BLAKE3 digests and groups paths whose fingerprints match.
//!
//! The library entry point is [`duplicates::DuplicateFinder`]; the binary
//! goes through [`run_app`].

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use cli::{Cli, Commands, HashArgs, OutputFormat, ScanArgs};
use config::Config;
use duplicates::{DuplicateFinder, FinderError, ScanOutcome, ScanReport};
use error::ExitCode;
use output::json::{JsonDigest, JsonOutput};
use output::text::{self, TextOutput};
use progress::Progress;
use scanner::{FileDigest, Hasher, OpenFileLimit, ScanError};
use signal::ShutdownHandler;

/// Run the command described by `cli` and map its result to an exit code.
///
/// # Errors
///
/// Returns an error for failures that end the run without a report:
/// invalid configuration, an unusable root, strict-mode path errors, or
/// interruption (downcasts to [`FinderError::Interrupted`]).
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let shutdown = signal::install_handler()?;
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Scan(args) => run_scan(&args, config, cli.quiet, &shutdown),
        Commands::Hash(args) => run_hash(&args, config, &shutdown),
    }
}

fn run_scan(args: &ScanArgs, mut config: Config, quiet: bool, shutdown: &ShutdownHandler) -> Result<ExitCode> {
    args.apply_to(&mut config);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);
    if let Some(ref path) = args.save_config {
        config
            .save(path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        log::info!("Saved configuration to {}", path.display());
    }

    let mut finder_config = config.finder_config().with_shutdown_flag(shutdown.flag());
    if !quiet && !args.no_progress {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let report = DuplicateFinder::new(finder_config)
        .find_duplicates(&args.path)
        .with_context(|| format!("Failed to scan {}", args.path.display()))?;

    let exit_code = exit_code_for(&report);
    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Text => TextOutput::new(&report, config.show_all).write_to(&mut stdout)?,
        OutputFormat::Json => {
            JsonOutput::new(&report, config.show_all, exit_code).write_to(&mut stdout, true)?;
        }
    }
    stdout.flush()?;

    Ok(exit_code)
}

/// Exit code for a finished scan: partial beats found, found beats none.
#[must_use]
pub fn exit_code_for(report: &ScanReport) -> ExitCode {
    match report.outcome() {
        ScanOutcome::Partial { .. } => ExitCode::PartialSuccess,
        ScanOutcome::Complete if report.has_duplicates() => ExitCode::Success,
        ScanOutcome::Complete => ExitCode::NoDuplicates,
    }
}

fn run_hash(args: &HashArgs, mut config: Config, shutdown: &ShutdownHandler) -> Result<ExitCode> {
    if let Some(size) = args.chunk_size {
        config.chunk_size = usize::try_from(size).unwrap_or(usize::MAX);
    }
    config.validate()?;

    let open_files = Arc::new(OpenFileLimit::new(config.io_threads));
    let mut hasher = Hasher::new()
        .with_chunk_size(config.chunk_size)
        .with_parallel_threshold(config.parallel_threshold)
        .with_shutdown_flag(shutdown.flag())
        .with_open_file_limit(open_files);
    if config.parallel_threshold.is_some() {
        hasher = hasher.with_chunk_pool(Arc::new(
            scanner::build_chunk_pool().map_err(FinderError::from)?,
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.io_threads.max(1))
        .thread_name(|i| format!("dupescan-io-{i}"))
        .build()
        .map_err(FinderError::from)?;
    let results: Vec<(PathBuf, Result<FileDigest, ScanError>)> = pool.install(|| {
        args.files
            .par_iter()
            .map(|path| (path.clone(), hasher.hash_file(path)))
            .collect()
    });

    if shutdown.is_shutdown_requested() {
        return Err(FinderError::Interrupted.into());
    }

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Text => {
            let ok = results
                .iter()
                .filter_map(|(path, r)| r.as_ref().ok().map(|d| (path.as_path(), d)));
            text::write_digests(&mut stdout, ok)?;
            for err in results.iter().filter_map(|(_, r)| r.as_ref().err()) {
                log::error!("{err}");
            }
        }
        OutputFormat::Json => {
            let entries: Vec<JsonDigest> = results.iter().map(|(p, r)| JsonDigest::new(p, r)).collect();
            serde_json::to_writer_pretty(&mut stdout, &entries)?;
            writeln!(stdout)?;
        }
    }
    stdout.flush()?;

    let failures = results.iter().filter(|(_, r)| r.is_err()).count();
    match failures {
        0 => Ok(ExitCode::Success),
        n if n < results.len() => Ok(ExitCode::PartialSuccess),
        n => anyhow::bail!("Failed to hash {n} of {} files", results.len()),
    }
}
