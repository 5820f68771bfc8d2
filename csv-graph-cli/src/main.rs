use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csv_graph::{CancellationFlag, Manifest, ProcessorBuilder};
use manifest::Template;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

mod manifest;

/// CSV Graph Builder
/// Builds a JSON-LD vocabulary and instance graph from CSV files described by a manifest
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output for detailed processing information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process CSV files according to a manifest
    Process {
        /// Path to the manifest file that specifies the CSV processing configuration
        #[arg(short, long, value_name = "PATH TO MANIFEST")]
        manifest: PathBuf,

        /// Fail on unknown columns and unparsable values instead of warning
        #[arg(short, long)]
        strict: bool,

        /// Skip rows with a missing identity or a malformed shape, with a warning
        #[arg(long)]
        skip_malformed_rows: bool,

        /// Output directory for generated JSON-LD files (defaults to the manifest's directory)
        #[arg(short, long, value_name = "OUTPUT DIRECTORY PATH")]
        output: Option<PathBuf>,
    },
    /// Generate a manifest template
    GenerateManifest {
        /// Which manifest template to write
        #[arg(short = 't', long = "type", value_enum, default_value_t = Template::Basic)]
        template: Template,

        /// Output path for the generated manifest
        #[arg(
            short,
            long,
            default_value = "manifest.jsonc",
            value_name = "OUTPUT PATH"
        )]
        output: PathBuf,
    },
    /// Validate a manifest file against the configuration schema
    Validate {
        /// Path to the manifest file to validate
        #[arg(
            short,
            long,
            default_value = "manifest.jsonc",
            value_name = "PATH TO MANIFEST"
        )]
        manifest: PathBuf,
        /// Treat duplicate steps as errors
        #[arg(short, long, default_value = "false")]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("CSV graph builder starting up...");

    match &cli.command {
        Commands::GenerateManifest { template, output } => {
            generate_manifest_command(*template, output)
        }
        Commands::Validate { manifest, strict } => validate_command(manifest, *strict),
        Commands::Process {
            manifest,
            strict,
            skip_malformed_rows,
            output,
        } => process_command(manifest, *strict, *skip_malformed_rows, output).await,
    }
}

async fn process_command(
    manifest_path: &PathBuf,
    strict: bool,
    skip_malformed_rows: bool,
    output: &Option<PathBuf>,
) -> Result<()> {
    if strict {
        info!("Running in strict mode");
    }

    if !manifest_path.exists() {
        anyhow::bail!("Manifest file not found: {}", manifest_path.display());
    }

    let base_path = manifest_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let output_path = output.clone().unwrap_or_else(|| base_path.clone());

    let cancellation = CancellationFlag::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next row");
            on_interrupt.cancel();
        }
    });

    info!("Loading manifest from {}", manifest_path.display());
    let mut processor = ProcessorBuilder::from_manifest_file(manifest_path)
        .context("Failed to load manifest. See errors for additional details:")?
        .with_strict(strict)
        .with_skip_malformed_rows(skip_malformed_rows)
        .with_cancellation(cancellation)
        .build()
        .context("Failed to validate manifest")?;

    info!(
        "Manifest '{}' loaded and validated successfully",
        processor.manifest().name
    );
    info!("Description: {}", processor.manifest().description);

    info!("Beginning CSV processing...");
    let outcome = processor
        .process()
        .await
        .context("Failed to process CSV files")?;
    outcome.report()?;

    processor
        .save(&output_path)
        .await
        .context(format!("Failed to write output to {}", output_path.display()))?;

    info!(
        "Wrote vocabulary.jsonld and instances.jsonld to {}",
        output_path.display()
    );
    Ok(())
}

fn generate_manifest_command(template: Template, output: &Path) -> Result<()> {
    info!("Generating {:?} manifest template...", template);

    let target = if output.is_dir() {
        output.join("manifest.jsonc")
    } else {
        output.to_path_buf()
    };
    fs::write(&target, template.contents())
        .with_context(|| format!("Failed to write manifest to: {}", target.display()))?;

    info!("Wrote manifest template to {}", target.display());
    Ok(())
}

fn validate_command(manifest_path: &PathBuf, is_strict: bool) -> Result<()> {
    info!("Validating manifest...");

    if !manifest_path.exists() {
        anyhow::bail!(
            "Manifest file not found: {}. Try using --manifest <PATH TO MANIFEST>",
            manifest_path.display()
        );
    }

    let mut manifest = Manifest::from_file(manifest_path)
        .context("Failed to parse manifest. See errors for additional details:")?;

    let warnings = manifest
        .validate(is_strict)
        .context("Failed to validate manifest")?;
    for warning in &warnings {
        warn!("{}", warning);
    }

    info!("Manifest validation successful");
    info!("Name: {}", manifest.name);
    info!("Description: {}", manifest.description);
    info!(
        "{} model step(s), {} instance step(s)",
        manifest.model.sequence.len(),
        manifest.instances.sequence.len()
    );
    Ok(())
}
