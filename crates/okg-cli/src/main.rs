//! OKG CLI - Command-line interface
//!
//! Usage:
//!   okg run [--input <dir>] [--output <dir>] [--strict]
//!   okg vocab
//!   okg check
//!   okg prompt <text>
//!
//! Author: hephaex@gmail.com

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use okg_core::{AppConfig, LoggingConfig};
use okg_extractor::{build_prompt, ExtractionClient, PrefilterMode, RetryPolicy};
use okg_graph::GraphStore;
use okg_llm::create_llm_client;
use okg_ontology::OntologyRegistry;
use okg_pipeline::{DirectorySource, Pipeline, RunReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status of a `--strict` run with partial failures
const PARTIAL_FAILURE_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "okg")]
#[command(about = "Ontology-constrained knowledge graph extraction")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a knowledge graph from a directory of documents
    Run {
        /// Directory of .txt, .md and .pdf documents
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output directory for the serialized graph
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Turtle ontology
        #[arg(long)]
        ontology: Option<PathBuf>,
        /// Exit with status 2 when a document, chunk or format failed
        #[arg(long)]
        strict: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the class and property vocabulary offered to the model
    Vocab {
        #[arg(long)]
        ontology: Option<PathBuf>,
    },
    /// Check that the model endpoint answers
    Check,
    /// Print the extraction prompt for a piece of text
    Prompt {
        text: String,
        #[arg(long)]
        ontology: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(std::io::stderr);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_registry(path: &Path) -> anyhow::Result<OntologyRegistry> {
    OntologyRegistry::load(path)
        .with_context(|| format!("Cannot initialise the ontology from {}", path.display()))
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run {
            input,
            output,
            ontology,
            strict,
            json,
        } => {
            if let Some(input) = input {
                config.input.dir = input;
            }
            if let Some(output) = output {
                config.graph.output_dir = output;
            }
            if let Some(ontology) = ontology {
                config.ontology.path = ontology;
            }
            run(config, strict, json).await
        }
        Commands::Vocab { ontology } => {
            let path = ontology.unwrap_or(config.ontology.path);
            let registry = load_registry(&path)?;

            println!("Classes ({}):", registry.class_names().len());
            for name in registry.class_names() {
                println!("  {name}");
            }
            println!("Properties ({}):", registry.property_names().len());
            for name in registry.property_names() {
                println!("  {name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            config.validate()?;
            let llm = create_llm_client(&config.llm)?;
            let reply = llm
                .health_check()
                .await
                .context("Model health check failed")?;
            println!("{} answered: {}", llm.model(), preview(&reply));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prompt { text, ontology } => {
            let path = ontology.unwrap_or(config.ontology.path);
            let registry = load_registry(&path)?;
            print!(
                "{}",
                build_prompt(
                    &text,
                    registry.class_names(),
                    registry.property_names(),
                    &config.graph.namespace,
                )
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(config: AppConfig, strict: bool, json: bool) -> anyhow::Result<ExitCode> {
    config.validate()?;
    info!("Starting knowledge graph extraction");

    let registry = load_registry(&config.ontology.path)?;

    let llm = create_llm_client(&config.llm)?;
    let reply = llm
        .health_check()
        .await
        .context("Model health check failed")?;
    info!(model = llm.model(), reply = %preview(&reply), "Model endpoint reachable");

    let extractor = ExtractionClient::new(llm, &config.graph.namespace)
        .with_retry(RetryPolicy::from_config(&config.extraction))
        .with_prefilter(PrefilterMode::from_flag(
            config.extraction.accept_literal_objects,
        ));
    let graph = GraphStore::new(&config.graph.prefix, &config.graph.namespace);
    let mut pipeline =
        Pipeline::new(registry, extractor, graph).with_file_stem(&config.graph.file_stem);

    let source = DirectorySource::new(&config.input.dir)
        .with_min_chunk_chars(config.input.min_chunk_chars);
    let report = pipeline
        .run(&source, &config.graph.output_dir)
        .await
        .with_context(|| format!("Cannot read input directory {}", config.input.dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if strict && report.has_partial_failures() {
        return Ok(ExitCode::from(PARTIAL_FAILURE_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &RunReport) {
    println!("Total triples: {}", report.triples);
    println!(
        "Documents: {} processed, {} skipped, {} failed",
        report.documents_processed, report.documents_skipped, report.documents_failed
    );
    println!(
        "Chunks: {} processed, {} failed",
        report.chunks_processed, report.chunks_failed
    );
    println!(
        "Lines: {} accepted, {} duplicate, {} rejected, {} discarded",
        report.lines_accepted, report.lines_duplicate, report.lines_rejected, report.lines_discarded
    );
    for file in &report.written {
        println!("Wrote {} ({})", file.path.display(), file.format);
    }
    for failure in &report.format_failures {
        eprintln!("Failed to write {}: {}", failure.format, failure.error);
    }
}
