//! Serve one or more API documents as a GraphQL endpoint.
//!
//! Usage: `oasgraph [DOCUMENTS]... [--config FILE] [--port PORT] [--strict] [--print-schema]`

use anyhow::{Context, Result, bail};
use clap::Parser;
use oasgraph_core::OasGraphConfig;
use oasgraph_openapi::{AuthState, Document, OpenApiGraph};
use oasgraph_server::{create_router, serve};
use oasgraph_telemetry::{DEFAULT_FILTER, Telemetry};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "oasgraph")]
#[command(about = "Expose REST APIs described by OpenAPI documents as GraphQL")]
struct Args {
    /// API document paths or URLs; defaults to the documents in the config file
    documents: Vec<String>,

    /// Config file (defaults to oasgraph.toml in this or a parent directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Fail on any translation warning
    #[arg(long)]
    strict: bool,

    /// Print the schema in SDL and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => OasGraphConfig::load_from(Some(path.as_path()))?,
        None => OasGraphConfig::load().unwrap_or_else(|e| {
            eprintln!("No configuration loaded ({}), using defaults", e);
            OasGraphConfig::test_defaults()
        }),
    };

    let observability = &config.observability;
    let mut telemetry = Telemetry::new(observability.log_filter.as_deref().unwrap_or(DEFAULT_FILTER))
        .json(observability.json_logs);
    if let Some(name) = &observability.service_name {
        telemetry = telemetry.service_name(name.clone());
    }
    telemetry.init();

    let sources = if args.documents.is_empty() {
        config.documents.clone()
    } else {
        args.documents.clone()
    };
    if sources.is_empty() {
        bail!("No API documents given on the command line or in the config file");
    }

    let mut documents = Vec::with_capacity(sources.len());
    for source in &sources {
        debug!("Loading {}", source);
        let document = if source.starts_with("http://") || source.starts_with("https://") {
            Document::from_url(source).await
        } else {
            Document::from_file(source)
        }
        .with_context(|| format!("Failed to load API document: {}", source))?;
        documents.push(document);
    }

    let mut options = config.options.clone();
    options.strict |= args.strict;

    let (schema, report) = OpenApiGraph::from_documents(documents)
        .with_options(options)
        .build()
        .context("Failed to translate API documents")?;
    if !report.warnings.is_empty() {
        warn!("Translation finished with {} warnings", report.warnings.len());
    }
    info!(
        "Translated {} operations into {} queries and {} mutations",
        report.num_ops, report.num_queries_created, report.num_mutations_created
    );

    if args.print_schema {
        println!("{}", schema.sdl());
        return Ok(());
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }
    let router = create_router(schema, AuthState::from_config(&config.credentials));
    serve(&config.server, router).await
}
