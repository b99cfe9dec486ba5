//! MDF Diff CLI
//!
//! Builds an old and a new model and reports what changed between them.
//!
//! Usage:
//!   diff-mdfs --old v1/model.yml --old v1/props.yml --new v2/model.yml --new v2/props.yml
//!   diff-mdfs --old a.yml --new b.yml --summary-only
//!   diff-mdfs --help

use std::path::PathBuf;

use anyhow::{Context, Result};
use bento_mdf::{diff_models, MdfConfig, MdfReader, MdfSource, Model, ReaderOptions};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diff-mdfs")]
#[command(about = "Report differences between two MDF models")]
struct Cli {
    /// Sources of the old model (repeat for multi-file models)
    #[arg(long, required = true)]
    old: Vec<String>,

    /// Sources of the new model (repeat for multi-file models)
    #[arg(long, required = true)]
    new: Vec<String>,

    /// Model handle for both models
    #[arg(long)]
    handle: Option<String>,

    /// Print only the plain-language summary
    #[arg(long)]
    summary_only: bool,

    /// Write entities as attribute dictionaries
    #[arg(long)]
    objects_as_dicts: bool,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (mdf.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build(sources: &[String], options: &ReaderOptions, config: &MdfConfig) -> Result<Model> {
    let sources: Vec<MdfSource> = sources.iter().map(|s| MdfSource::parse(s)).collect();
    let mut reader = MdfReader::new(options.clone()).with_loader(config.loader());
    reader
        .load(&sources)
        .with_context(|| format!("loading {:?}", sources.iter().map(|s| s.to_string()).collect::<Vec<_>>()))?;
    reader.create_model()?;
    if !reader.diagnostics().is_empty() {
        tracing::warn!(
            errors = reader.diagnostics().error_count(),
            warnings = reader.diagnostics().warning_count(),
            "model built with diagnostics"
        );
    }
    Ok(reader.into_model()?)
}

fn run(cli: Cli) -> Result<()> {
    let config = MdfConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let mut options = config.reader.clone();
    if cli.handle.is_some() {
        options.handle = cli.handle.clone();
    }
    let old = build(&cli.old, &options, &config).context("building old model")?;
    let new = build(&cli.new, &options, &config).context("building new model")?;

    let mut diff_options = config.diff.clone();
    diff_options.include_summary = true;
    diff_options.objects_as_dicts |= cli.objects_as_dicts;
    let diff = diff_models(&old, &new, &diff_options)?;

    if cli.summary_only {
        let text = diff.summary.clone().unwrap_or_else(|| "No differences".to_string());
        match &cli.output {
            Some(path) => std::fs::write(path, format!("{}\n", text))
                .with_context(|| format!("writing {}", path.display()))?,
            None => println!("{}", text),
        }
        return Ok(());
    }

    let report = json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "old": { "handle": old.handle, "version": old.version },
        "new": { "handle": new.handle, "version": new.version },
        "diff": diff.to_json(),
    });
    let text = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("📝 Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
