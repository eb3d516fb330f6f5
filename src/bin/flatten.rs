//! OpenAPI Flatten CLI
//!
//! Flattens a multi-file OpenAPI document into a single document.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use openapi_flatten::{
    flatten, read_document, FileSystemSource, FlattenConfig, FlattenReport, OpenApi, OutputFormat,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "openapi-flatten")]
#[command(about = "Pull external $ref targets into a document's components")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a root document
    Flatten {
        /// Root OpenAPI document (JSON or YAML)
        input: PathBuf,

        /// Write the flattened document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to the configured one)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Directory relative references are resolved against
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Compact JSON output
        #[arg(long)]
        compact: bool,

        /// Exit non-zero when any reference could not be resolved
        #[arg(long)]
        strict: bool,
    },

    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "flatten.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = FlattenConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Flatten {
            input,
            output,
            format,
            base_dir,
            compact,
            strict,
        } => {
            if base_dir.is_some() {
                config.source.base_dir = base_dir;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            if compact {
                config.output.pretty = false;
            }

            let mut document = read_document(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let root = config.base_dir_for(&input);
            info!(input = %input.display(), root = %root.display(), "flattening");

            let source = FileSystemSource::new(root);
            let report = flatten(&mut document, &source, &config);

            let rendered = render(&document, &config)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Wrote {}", path.display());
                }
                None => print!("{rendered}"),
            }

            print_report(&report);
            if strict && !report.is_complete() {
                bail!("{} reference(s) could not be resolved", report.unresolved.len());
            }
            Ok(())
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let rendered = toml::to_string_pretty(&config)?;
                print!("{rendered}");
                Ok(())
            }
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                save_default(&path)?;
                eprintln!("Wrote {}", path.display());
                Ok(())
            }
        },
    }
}

fn render(document: &OpenApi, config: &FlattenConfig) -> anyhow::Result<String> {
    let mut rendered = match config.output.format {
        OutputFormat::Json if config.output.pretty => serde_json::to_string_pretty(document)?,
        OutputFormat::Json => serde_json::to_string(document)?,
        OutputFormat::Yaml => serde_yaml::to_string(document)?,
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

fn print_report(report: &FlattenReport) {
    eprintln!(
        "Flattened {} reference(s); {} definition(s) in components, {} reference edge(s)",
        report.resolved, report.definitions, report.edges
    );
    for reference in &report.unresolved {
        eprintln!("  unresolved: {reference}");
    }
    for cycle in &report.cycles {
        let members: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        eprintln!("  cycle: {}", members.join(" -> "));
    }
}

fn save_default(path: &Path) -> anyhow::Result<()> {
    let path = path
        .to_str()
        .context("config path is not valid UTF-8")?;
    FlattenConfig::default().save(path)?;
    Ok(())
}
