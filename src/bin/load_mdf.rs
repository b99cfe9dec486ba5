//! MDF Loader CLI
//!
//! Validates MDF sources, builds the model and reports what the build found.
//! Optionally writes the model back out as a single MDF file.
//!
//! Usage:
//!   load-mdf model.yml model-props.yml
//!   load-mdf ./model-dir --strict --write merged.yml
//!   load-mdf --help

use std::path::PathBuf;

use anyhow::{Context, Result};
use bento_mdf::{MdfConfig, MdfError, MdfReader, MdfSource, MdfWriter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "load-mdf")]
#[command(about = "Validate MDF files and build the model they describe")]
struct Cli {
    /// MDF files, directories or URLs, merged in order
    #[arg(required = true)]
    sources: Vec<String>,

    /// Model handle (overrides the MDF's Handle)
    #[arg(long)]
    handle: Option<String>,

    /// Exit non-zero when the build records any error
    #[arg(long)]
    strict: bool,

    /// Skip JSON schema validation
    #[arg(long)]
    no_validate: bool,

    /// Validate against this schema instead of the bundled one
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Leave enum references (URLs, paths) unloaded
    #[arg(long)]
    ignore_enum_refs: bool,

    /// Write the built model as MDF YAML to this file
    #[arg(short, long)]
    write: Option<PathBuf>,

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

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Ok(false) when a strict build failed
fn run(cli: Cli) -> Result<bool> {
    let config = MdfConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let mut options = config.reader.clone();
    if cli.handle.is_some() {
        options.handle = cli.handle.clone();
    }
    options.strict |= cli.strict;
    options.validate &= !cli.no_validate;
    options.ignore_enum_by_reference |= cli.ignore_enum_refs;
    if cli.schema.is_some() {
        options.schema_path = cli.schema.clone();
    }

    let sources: Vec<MdfSource> = cli.sources.iter().map(|s| MdfSource::parse(s)).collect();
    let mut reader = MdfReader::new(options).with_loader(config.loader());
    reader.load(&sources).context("loading MDF")?;
    for digest in reader.digests() {
        println!("📄 {}", digest);
    }

    match reader.create_model() {
        Ok(_) => {}
        Err(MdfError::Build(diagnostics)) => {
            eprint!("{}", diagnostics.format_all());
            eprintln!("❌ Model build failed");
            return Ok(false);
        }
        Err(e) => return Err(e).context("building model"),
    }

    let diagnostics = reader.diagnostics();
    if !diagnostics.is_empty() {
        eprint!("{}", diagnostics.format_all());
    }

    let model = reader.model()?;
    println!(
        "✅ Model '{}'{}: {} nodes, {} edges, {} properties, {} terms",
        model.handle,
        model.version.as_deref().map(|v| format!(" v{}", v)).unwrap_or_default(),
        model.nodes().len(),
        model.edges().len(),
        model.props().len(),
        model.terms().len()
    );

    if let Some(path) = &cli.write {
        MdfWriter::new(model)
            .with_config(config.writer.clone())
            .write_file(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("📝 Wrote {}", path.display());
    }

    Ok(true)
}
