//! Logging setup on top of the `log` facade and `env_logger`.
//!
//! The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `--verbose` (debug, then trace)
//! 3. Info by default
//!
//! Output always goes to stderr so that report output on stdout stays
//! machine readable.

use std::env;
use std::io::Write;

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Initialize logging from CLI verbosity flags.
///
/// Returns `false` if a logger was already installed for this process,
/// which happens when the binary's entry point is driven repeatedly from
/// tests.
///
/// # Example
///
/// ```rust,no_run
/// use dupescan::logging::init_logging;
///
/// init_logging(1, false);
/// log::debug!("visible with -v");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let from_env = env::var_os("RUST_LOG").is_some();

    let mut builder = Builder::new();
    builder.target(Target::Stderr);
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder, verbose);

    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!("Logging initialized at level {}", current_level_name());
    }
    installed
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Debug builds and `-v` include timestamps and module paths; release
/// builds otherwise print level and message only.
fn configure_format(builder: &mut Builder, verbose: u8) {
    let detailed = cfg!(debug_assertions) || verbose >= 1;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if detailed {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });
}

/// Name of the currently active maximum log level.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
