//! Zathras post-processing command line.
//!
//! Processes every `results_<test>` directory under `--input`, optionally
//! writing document JSON and exporting to OpenSearch.
//!
//! ## Configuration
//!
//! - `--config <yaml>`: `opensearch:` section (url, indices, credentials, retries)
//! - `OPENSEARCH_*` environment variables when no config file is given
//! - `RUST_LOG`: Log level filter (default: info, debug with `--verbose`)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for terminals (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin zathras_post --features cli -- --input ./results --opensearch
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zathras_post::{
    DocumentExporter, InMemorySummaryStore, InMemoryTimeseriesStore, OpenSearchConfig,
    OpenSearchExporter, Pipeline, PipelineConfig, ProcessingStats, ProcessorRegistry,
};

/// Normalize Zathras benchmark results and export them.
#[derive(Debug, Parser)]
#[command(name = "zathras_post", version)]
struct Args {
    /// Directory to search for result directories.
    #[arg(long)]
    input: PathBuf,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Export summaries and timeseries to OpenSearch.
    #[arg(long)]
    opensearch: bool,

    /// Write each document as `{document_id}.json` into this directory.
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Debug logging.
    #[arg(long, short)]
    verbose: bool,
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(verbose: bool) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let default_level = if verbose { "zathras_post=debug" } else { "zathras_post=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

fn load_opensearch_config(path: Option<&Path>) -> anyhow::Result<OpenSearchConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml_file(path)?;
            info!(path = %path.display(), "Loaded config");
            Ok(config.opensearch)
        }
        None => Ok(OpenSearchConfig::from_env()),
    }
}

async fn run(args: &Args) -> anyhow::Result<ProcessingStats> {
    let registry = ProcessorRegistry::with_defaults();

    if !args.opensearch {
        let mut pipeline = Pipeline::<InMemorySummaryStore, InMemoryTimeseriesStore>::new(registry);
        if let Some(dir) = &args.output_json {
            pipeline = pipeline.with_output_json(dir.clone());
        }
        return Ok(pipeline.run(&args.input).await?);
    }

    let config = load_opensearch_config(args.config.as_deref())?;
    let batch_size = config.bulk_batch_size;
    let client = Arc::new(OpenSearchExporter::new(config).context("failed to build OpenSearch client")?);

    client
        .test_connection()
        .await
        .with_context(|| format!("cannot reach OpenSearch at {}", client.config().url))?;
    client.ensure_indices().await.context("failed to prepare indices")?;

    let exporter = DocumentExporter::new(client.clone(), client).with_batch_size(batch_size);
    let mut pipeline = Pipeline::new(registry).with_exporter(exporter);
    if let Some(dir) = &args.output_json {
        pipeline = pipeline.with_output_json(dir.clone());
    }
    Ok(pipeline.run(&args.input).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        input = %args.input.display(),
        opensearch = args.opensearch,
        "Starting Zathras post-processing"
    );

    let stats = run(&args).await?;
    println!("{stats}");
    std::process::exit(stats.exit_code());
}
