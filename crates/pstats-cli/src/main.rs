//! CLI tool for filtering Python profiler results.
//!
//! Reads a `cProfile`/`pstats` dump, drops every call site whose filename
//! matches one of the given globs, and writes the reduced dump to stdout.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use pstats_analysis::FilterConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LONG_ABOUT: &str = "\
Filter profile results.

Accepts a profiler dump and one or more globs for excluding filenames from
the results. The filtered dump is written to stdout.

All filename globs match recursively with '*'. For example, the glob
'foo/*/bar' matches 'foo/one/two/bar'.

Globs match whole filenames. For example, the glob 'foo/bar' matches
'foo/bar', but not 'baz/foo/bar'.";

#[derive(Parser, Debug)]
#[command(name = "filter-profile")]
#[command(about = "Filter Python profiler results by source filename", long_about = LONG_ABOUT)]
#[command(version, arg_required_else_help = true)]
struct Cli {
    /// The profile file to filter
    profile: PathBuf,

    /// Globs for filenames to exclude
    #[arg(value_name = "GLOB", required = true)]
    globs: Vec<String>,

    /// Remove various symbols and filenames which are probably useless
    #[arg(long)]
    remove_garbage: bool,

    /// Print all filenames which will be included to stderr
    #[arg(long)]
    print_included_filenames: bool,

    /// Write the filtered profile to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Print a summary of what was removed to stderr
    #[arg(long, value_enum)]
    summary: Option<SummaryFormat>,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

/// Available formats for the reduction summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    /// Aligned plain text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Logs go to stderr so stdout only ever carries the profile.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = commands::FilterOptions {
        profile: cli.profile,
        config: FilterConfig::new(cli.globs).with_remove_garbage(cli.remove_garbage),
        print_included_filenames: cli.print_included_filenames,
        output: cli.output,
        summary: cli.summary,
    };
    commands::filter(&options)
}
