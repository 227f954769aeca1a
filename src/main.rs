//! # synfig-lottie
//!
//! Converts Synfig scenes (JSON rendition) to Lottie animations.
//!
//! Several documents may be given at once; they are converted in parallel
//! and each gets its own output file. The exit status is non-zero when any
//! document failed to load or lost a layer to a fatal error.

use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use sif_pipeline::{convert_document, ConvertOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synfig-lottie")]
#[command(about = "Convert Synfig scenes to Lottie animations")]
#[command(version)]
struct Cli {
    /// Scene documents to convert
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file, `-` for stdout, or a directory when converting several
    /// documents. Defaults to the input path with a `.lottie.json` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with conversion options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Decimal places kept in the output
    #[arg(long, conflicts_with = "full_precision")]
    precision: Option<u32>,

    /// Keep every float at full precision
    #[arg(long)]
    full_precision: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    /// Samples per spline segment for outlines
    #[arg(long)]
    samples: Option<usize>,

    /// Replace the frame rate of every document
    #[arg(long)]
    frame_rate: Option<f64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Outcome of one document.
#[derive(Debug)]
struct Report {
    input: PathBuf,
    output: Option<PathBuf>,
    fatal: usize,
    warnings: usize,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Options from the config file, then the command line on top.
fn load_options(cli: &Cli) -> Result<ConvertOptions> {
    let mut opts = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parse config '{}'", path.display()))?
        }
        None => ConvertOptions::default(),
    };
    if let Some(precision) = cli.precision {
        opts.precision = Some(precision);
    }
    if cli.full_precision {
        opts.precision = None;
    }
    if cli.pretty {
        opts.pretty = true;
    }
    if let Some(samples) = cli.samples {
        opts.samples = samples;
    }
    if let Some(fps) = cli.frame_rate {
        opts.frame_rate = Some(fps);
    }
    Ok(opts)
}

/// Where the document read from `input` is written. `None` means stdout.
fn output_path(input: &Path, output: Option<&Path>, many: bool) -> Result<Option<PathBuf>> {
    let default_name = || input.with_extension("lottie.json");
    match output {
        None => Ok(Some(default_name())),
        Some(out) if out == Path::new("-") => {
            if many {
                bail!("stdout output takes a single input document");
            }
            Ok(None)
        }
        Some(out) if many || out.is_dir() => {
            let name = default_name();
            let file = name
                .file_name()
                .with_context(|| format!("input '{}' has no file name", input.display()))?;
            Ok(Some(out.join(file)))
        }
        Some(out) => Ok(Some(out.to_path_buf())),
    }
}

fn convert_file(input: &Path, output: Option<PathBuf>, opts: &ConvertOptions) -> Result<Report> {
    let file = fs::File::open(input).with_context(|| format!("open '{}'", input.display()))?;
    let doc = sif_data::from_reader(BufReader::new(file))
        .with_context(|| format!("load scene '{}'", input.display()))?;

    let conversion = convert_document(&doc, opts);
    let json = conversion
        .to_json(opts)
        .with_context(|| format!("serialize '{}'", input.display()))?;

    match &output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            fs::write(path, json).with_context(|| format!("write '{}'", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).context("write to stdout")?;
        }
    }

    let fatal = conversion.errors.iter().filter(|e| e.is_fatal()).count();
    Ok(Report {
        input: input.to_path_buf(),
        output,
        fatal,
        warnings: conversion.errors.len() - fatal,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);
    let opts = load_options(&cli)?;

    let many = cli.inputs.len() > 1;
    if many {
        if let Some(dir) = cli.output.as_deref().filter(|p| *p != Path::new("-")) {
            fs::create_dir_all(dir)
                .with_context(|| format!("create output dir '{}'", dir.display()))?;
        }
    }

    let results: Vec<(PathBuf, Result<Report>)> = cli
        .inputs
        .par_iter()
        .map(|input| {
            let result = output_path(input, cli.output.as_deref(), many)
                .and_then(|output| convert_file(input, output, &opts));
            (input.clone(), result)
        })
        .collect();

    let mut failed = 0;
    for (input, result) in results {
        match result {
            Ok(report) => {
                let target = report
                    .output
                    .as_ref()
                    .map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
                if report.fatal > 0 {
                    failed += 1;
                    error!(
                        input = %report.input.display(),
                        fatal = report.fatal,
                        "layers dropped by fatal errors"
                    );
                } else if report.warnings > 0 {
                    warn!(input = %report.input.display(), warnings = report.warnings, "converted with warnings");
                }
                info!(input = %report.input.display(), output = %target, "written");
            }
            Err(err) => {
                failed += 1;
                error!(input = %input.display(), error = %format!("{:#}", err), "conversion failed");
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} documents had fatal errors", failed, cli.inputs.len());
    }
    Ok(())
}
