//! Command implementation for the filter CLI.

use crate::SummaryFormat;
use anyhow::{Context, Result};
use pstats_analysis::{included_filenames, FilterConfig, Reducer, Reduction, Report};
use pstats_core::Profile;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Everything the filter command needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub profile: PathBuf,
    pub config: FilterConfig,
    pub print_included_filenames: bool,
    pub output: Option<PathBuf>,
    pub summary: Option<SummaryFormat>,
}

/// Filter command: reduce the profile and write it to the output.
///
/// An output file is only replaced once the input has been read and
/// reduced, so it may name the input itself.
pub fn filter(options: &FilterOptions) -> Result<()> {
    let reduction = reduce_profile(options)?;
    let stderr = io::stderr();
    match &options.output {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut tmp = NamedTempFile::new_in(dir)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            write_reduction(
                options,
                &reduction,
                BufWriter::new(tmp.as_file_mut()),
                stderr.lock(),
            )?;
            tmp.persist(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Ok(())
        }
        None => write_reduction(
            options,
            &reduction,
            BufWriter::new(io::stdout().lock()),
            stderr.lock(),
        ),
    }
}

/// Run the filter with explicit output streams.
///
/// The reduced profile goes to `out`; the filename listing and summary go
/// to `diag`.
pub fn run_filter<O, D>(options: &FilterOptions, out: O, diag: D) -> Result<()>
where
    O: Write,
    D: Write,
{
    let reduction = reduce_profile(options)?;
    write_reduction(options, &reduction, out, diag)
}

/// Compile the filters, load the profile and reduce it.
fn reduce_profile(options: &FilterOptions) -> Result<Reduction> {
    let filters = options
        .config
        .build()
        .context("Failed to compile filename filters")?;
    tracing::debug!(filters = filters.len(), "compiled filename filters");

    let profile = Profile::read_from(&options.profile)
        .with_context(|| format!("Failed to load profile {}", options.profile.display()))?;

    Ok(Reducer::new(filters).reduce(&profile))
}

fn write_reduction<O, D>(
    options: &FilterOptions,
    reduction: &Reduction,
    mut out: O,
    mut diag: D,
) -> Result<()>
where
    O: Write,
    D: Write,
{
    if options.print_included_filenames {
        for filename in included_filenames(&reduction.profile) {
            writeln!(diag, "{}", filename)?;
        }
    }

    reduction
        .profile
        .write_to(&mut out)
        .context("Failed to write filtered profile")?;
    out.flush().context("Failed to write filtered profile")?;

    match options.summary {
        Some(SummaryFormat::Text) => {
            write!(diag, "{}", Report::new(&reduction.metrics).to_text())?;
        }
        Some(SummaryFormat::Json) => {
            let json = Report::new(&reduction.metrics)
                .to_json()
                .context("Failed to serialize summary")?;
            writeln!(diag, "{}", json)?;
        }
        None => {}
    }

    Ok(())
}
