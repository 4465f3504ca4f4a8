use anyhow::Context as _;
use apiscope_engine::ExampleEngine;
use apiscope_mcp::{DirectorySource, ServerConfig, SpecRegistry, ToolHandler, load_config, serve_stdio};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "apiscope-mcp", version, about = "OpenAPI code examples for MCP clients (stdio)")]
struct Args {
    /// Directory containing `OpenAPI` specs (`*.json`, `*.yaml`, `*.yml`)
    #[arg(long, env = "APISCOPE_SPECS_DIR")]
    specs_dir: Option<PathBuf>,

    /// Optional YAML config file
    #[arg(short, long, env = "APISCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overridden by `RUST_LOG`)
    #[arg(long, env = "APISCOPE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, env = "APISCOPE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Maximum number of cached examples
    #[arg(long, env = "APISCOPE_CACHE_CAPACITY")]
    cache_capacity: Option<usize>,

    /// Cached example freshness in milliseconds
    #[arg(long, env = "APISCOPE_CACHE_TTL_MS")]
    cache_ttl_ms: Option<u64>,

    /// Module imported by generated examples
    #[arg(long, env = "APISCOPE_CLIENT_MODULE")]
    client_module: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format)?;

    let cfg = resolve_config(&args)?;
    let specs_dir = cfg
        .specs_dir
        .clone()
        .context("no specs directory configured (use --specs-dir or specsDir in the config file)")?;

    let registry = Arc::new(SpecRegistry::new(Box::new(DirectorySource::new(specs_dir))));
    registry.reload().await.context("load specs")?;

    let engine = Arc::new(ExampleEngine::new(cfg.engine).context("invalid engine configuration")?);
    let handler = ToolHandler::new(registry, Arc::clone(&engine));

    tracing::info!("serving MCP over stdio");
    let served = serve_stdio(handler).await;
    engine.shutdown();
    served
}

fn resolve_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(dir) = &args.specs_dir {
        cfg.specs_dir = Some(dir.clone());
    }
    if let Some(capacity) = args.cache_capacity {
        cfg.engine.cache.capacity = capacity;
    }
    if let Some(ttl_ms) = args.cache_ttl_ms {
        cfg.engine.cache.ttl_ms = ttl_ms;
    }
    if let Some(module) = &args.client_module {
        cfg.engine.client_module.clone_from(module);
    }
    Ok(cfg)
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("invalid log level")?,
    };

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}
