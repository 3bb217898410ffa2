//! Quarry CLI - resolve declarative data-dependency graphs

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use quarry::error::{FixSuggestion, QuarryError};
use quarry::graph::validate::validate_inputs;
use quarry::{GraphDefinition, ResolveRequest, SchemaCatalog};

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - declarative data-dependency graph resolver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a graph file and print the result map
    Run {
        /// Path to the graph definition (YAML)
        file: PathBuf,

        /// Resolve only these nodes (plus their dependencies)
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// One-shot input override, `path=value` (value parsed as JSON, else string)
        #[arg(short, long = "input", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,

        /// Include parameters and responses in error messages
        #[arg(long)]
        debug: bool,
    },

    /// Validate a graph file (parse, schemas, references, inputs)
    Validate {
        /// Path to the graph definition (YAML)
        file: PathBuf,
    },

    /// List built-in schemas
    Schemas,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match &cli.command {
        Commands::Run { debug: true, .. } => tracing::Level::DEBUG,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            file,
            targets,
            inputs,
            debug,
        } => run_graph(&file, targets, inputs, debug).await,
        Commands::Validate { file } => validate_graph(&file),
        Commands::Schemas => {
            list_schemas();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn parse_input(raw: &str) -> anyhow::Result<(String, Value)> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected path=value, got '{}'", raw))?;
    if path.is_empty() {
        anyhow::bail!("input path cannot be empty");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((path.to_string(), value))
}

async fn run_graph(
    file: &Path,
    targets: Vec<String>,
    inputs: Vec<(String, Value)>,
    debug: bool,
) -> Result<(), QuarryError> {
    let yaml = tokio::fs::read_to_string(file).await?;
    let mut definition = GraphDefinition::from_yaml(&yaml)?;
    if debug {
        definition.config.debug = true;
    }
    let orchestrator = definition.into_orchestrator(&SchemaCatalog::builtin())?;

    let mut request = ResolveRequest::targets(targets);
    for (path, value) in inputs {
        request = request.with_override(&path, value)?;
    }

    let resolution = orchestrator.resolve(request).await;
    let metrics = resolution.metrics.clone();
    let results = resolution.into_result()?;

    let output = serde_json::to_string_pretty(&results).map_err(|e| QuarryError::ConfigError {
        reason: format!("cannot render results: {}", e),
    })?;
    println!("{}", output);

    eprintln!(
        "{} {} node(s), {} call(s)",
        "✓".green(),
        results.len(),
        metrics.total_calls()
    );
    for (key, call) in metrics.iter() {
        let source = if call.cached { "cache".cyan() } else { "live".normal() };
        eprintln!(
            "  {} {} calls={} retries={} pages={} {}ms",
            key,
            source,
            call.total_calls(),
            call.retries,
            call.pages,
            call.duration_ms
        );
    }

    Ok(())
}

fn validate_graph(file: &Path) -> Result<(), QuarryError> {
    let definition = GraphDefinition::from_file(file)?;
    let input_root = Value::Object(definition.inputs.clone());
    let graph = definition.build(&SchemaCatalog::builtin())?;

    graph.validate()?;
    let plan = graph.plan(&[])?;
    validate_inputs(&graph, &plan, |name| {
        quarry::util::path::get(&input_root, name).is_some()
    })?;

    println!("{} Graph '{}' is valid", "✓".green(), file.display());
    println!("  Nodes: {}", graph.len());
    println!("  Roots: {}", graph.roots().len());
    println!("  Inputs: {}", definition.inputs.len());

    Ok(())
}

fn list_schemas() {
    let catalog = SchemaCatalog::builtin();
    for name in catalog.names() {
        if let Some(schema) = catalog.get(name) {
            println!("{}  {}", name.cyan(), format!("(source: {})", schema.source).dimmed());
        }
    }
}
