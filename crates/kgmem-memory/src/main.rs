//! CLI entry point for the kgmem knowledge graph memory.
//!
//! Reads one JSON call per line from stdin and writes one JSON response per
//! line to stdout. Logs go to stderr.

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{fmt, EnvFilter};

use kgmem_core::config::Settings;
use kgmem_graph::{GraphClient, GraphConfig, GraphStore, InMemoryStore};
use kgmem_memory::stdio::serve;
use kgmem_memory::KnowledgeGraphMemory;

#[derive(Parser)]
#[command(name = "kgmem")]
#[command(about = "Persistent knowledge graph memory backed by Neo4j")]
struct Cli {
    /// Config file prefix (default: kgmem).
    #[arg(short, long, default_value = "kgmem")]
    config: String,

    /// Keep the graph in process memory instead of Neo4j. Nothing is persisted.
    #[arg(long)]
    ephemeral: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if cli.ephemeral {
        tracing::warn!("Using an ephemeral in-memory graph");
        run(InMemoryStore::new()).await?;
        return Ok(());
    }

    let settings = Settings::load(&cli.config)?;
    let graph = GraphClient::connect(&GraphConfig::from(settings.neo4j)).await?;
    graph.ensure_schema().await?;

    run(graph).await?;
    tracing::info!("Released Neo4j connection");
    Ok(())
}

async fn run<S: GraphStore + Clone>(store: S) -> anyhow::Result<()> {
    let memory = KnowledgeGraphMemory::new(store);
    tracing::info!("Knowledge graph memory ready on stdio");

    let handled = serve(
        &memory,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    tracing::info!(handled, "Input closed, shutting down");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
