//! `font-slices` — reslice a static font into web font subsets.
//!
//! Fetches a slice definition (by default, Google `nam-files` simplified
//! Chinese slices), intersects each slice with the font's glyph coverage,
//! subsets the font once per slice through `fonttools`, and writes a
//! stylesheet of `@font-face` rules with matching `unicode-range`s so a page
//! only downloads the slices it renders.

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use font_slices::{dispatch, parse_definition, DispatchOptions, FontFace};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod coverage;
mod fetch;
mod subset;

const DEFAULT_SLICES_URL: &str = "https://raw.githubusercontent.com/googlefonts/nam-files/\
     refs/heads/main/slices/simplified-chinese_default.txt";

/// Exit code when the definition source parses to zero slices.
const EXIT_EMPTY_DEFINITION: u8 = 2;
/// Exit code when one or more subsetting units failed.
const EXIT_SUBSET_FAILED: u8 = 3;
/// Exit code for any other failure.
const EXIT_FAILURE: u8 = 1;

/// Reslice a static font into lazily loadable web font subsets.
#[derive(Debug, Parser)]
#[command(name = "font-slices", version, about)]
struct Cli {
    /// Path to the source font (.ttf / .otf)
    #[arg(long)]
    font: PathBuf,

    /// Slice definition source (URL or local path)
    #[arg(long, default_value = DEFAULT_SLICES_URL)]
    slices: String,

    /// Output directory for subset fonts and the stylesheet
    #[arg(long, default_value = ".")]
    outdir: PathBuf,

    /// font-family name used in the stylesheet (defaults to the font file stem)
    #[arg(long)]
    family: Option<String>,

    /// CSS font-style
    #[arg(
        long,
        default_value = "normal",
        value_parser = clap::builder::PossibleValuesParser::new(["normal", "italic"])
    )]
    style: String,

    /// CSS font-weight (use a concrete value such as 400 for static fonts)
    #[arg(long, default_value = "400")]
    weight: String,

    /// Number of parallel subsetting jobs
    #[arg(long, default_value_t = default_jobs())]
    jobs: usize,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Default worker count: detected parallelism, capped — subsetting spawns
/// one external process per worker.
fn default_jobs() -> usize {
    num_cpus::get().clamp(1, 8)
}

/// Definition parsed but yielded zero slices; usually a wrong source URL or
/// format rather than a syntax error.
#[derive(Debug, thiserror::Error)]
#[error("definition source yielded no slices; check the URL or file format")]
struct EmptyDefinition;

/// One or more subsetting units failed; details were logged per slice.
#[derive(Debug, thiserror::Error)]
#[error("{count} subsetting job(s) failed")]
struct SubsetFailures {
    count: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(err) = run(cli) {
        tracing::error!("{err:#}");
        return ExitCode::from(exit_code_for(&err));
    }
    ExitCode::SUCCESS
}

fn init_logging(directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.is::<EmptyDefinition>() {
        EXIT_EMPTY_DEFINITION
    } else if err.is::<SubsetFailures>() {
        EXIT_SUBSET_FAILED
    } else {
        EXIT_FAILURE
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let family = match &cli.family {
        Some(family) => family.clone(),
        None => font_family_from_path(&cli.font)?,
    };
    let file_stem = sanitize_family(&family);

    let text = fetch::fetch_text(&cli.slices)?;
    let slices = parse_definition(&text).context("failed to parse slice definition")?;
    if slices.is_empty() {
        return Err(EmptyDefinition.into());
    }

    let coverage = coverage::font_coverage(&cli.font)?;
    tracing::info!(
        "parsed {} slices; font covers {} codepoints",
        slices.len(),
        coverage.len()
    );

    fs::create_dir_all(&cli.outdir)
        .with_context(|| format!("failed to create output directory {}", cli.outdir.display()))?;
    let tool = subset::SubsetTool::resolve()?;
    tracing::info!(
        "subsetting with {} ({}, weight {}, {} jobs)",
        tool.describe(),
        cli.style,
        cli.weight,
        cli.jobs.max(1)
    );
    let subsetter = subset::ExternalSubsetter::new(tool, cli.font.clone(), cli.outdir.clone());

    let options = DispatchOptions {
        face: FontFace {
            family,
            style: cli.style.clone(),
            weight: cli.weight.clone(),
        },
        file_stem: file_stem.clone(),
        container: "woff2".to_owned(),
        jobs: cli.jobs,
    };
    let report = dispatch(&slices, &coverage, &subsetter, &options)?;

    for failure in &report.failures {
        tracing::error!("slice {:03}: {}", failure.ordinal, failure.error);
    }
    if !report.failures.is_empty() {
        // Successful artifacts stay on disk, but a stylesheet referencing
        // only the surviving slices would ship a font with holes.
        return Err(SubsetFailures {
            count: report.failures.len(),
        }
        .into());
    }

    let stylesheet_path = cli.outdir.join(format!("{file_stem}.sc-slices.css"));
    fs::write(&stylesheet_path, report.stylesheet())
        .with_context(|| format!("failed to write stylesheet {}", stylesheet_path.display()))?;

    tracing::info!(
        "done: {} slices total, {} emitted, {} skipped",
        report.total(),
        report.emitted(),
        report.skipped()
    );
    tracing::info!("stylesheet written to {}", stylesheet_path.display());
    Ok(())
}

fn font_family_from_path(path: &Path) -> anyhow::Result<String> {
    let stem = path
        .file_stem()
        .with_context(|| format!("font path {} has no file name", path.display()))?;
    Ok(stem.to_string_lossy().into_owned())
}

/// Collapses runs of characters unsafe in file names (and URLs) to a single
/// `-`, keeping ASCII alphanumerics, `_`, `.` and `-`.
fn sanitize_family(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_replacement = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
            out.push(ch);
            last_was_replacement = false;
        } else if !last_was_replacement {
            out.push('-');
            last_was_replacement = true;
        }
    }
    out
}
