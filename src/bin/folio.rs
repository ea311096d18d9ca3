//! CLI binary for folio.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use folio::server::MetadataServer;
use folio::{FolioConfig, build_service};
use folio_metadata::MetadataQuery;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Folio: bibliographic metadata aggregation service.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Path to TOML configuration file. Defaults to `~/.config/folio/config.toml`.
    #[arg(short, long, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fetch one reconciled record and print it as JSON.
    Fetch {
        #[arg(long)]
        title: Option<String>,

        /// Author name; repeat for several.
        #[arg(long = "author")]
        authors: Vec<String>,

        #[arg(long)]
        isbn: Option<String>,

        #[arg(long)]
        locale: Option<String>,

        /// Restrict to a provider id; repeat for several.
        #[arg(long = "provider")]
        providers: Vec<String>,
    },

    /// List registered providers.
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => FolioConfig::from_file(path)?,
        None => FolioConfig::load_or_default(&FolioConfig::default_config_path())?,
    };

    // Logs go to stderr so `fetch` output stays clean JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => run_serve(config, port).await,
        Command::Fetch {
            title,
            authors,
            isbn,
            locale,
            providers,
        } => {
            let mut query = MetadataQuery {
                title,
                authors,
                isbn,
                ..Default::default()
            };
            if let Some(locale) = locale {
                query.locale = locale;
            }
            if !providers.is_empty() {
                query.provider_ids = Some(providers);
            }
            run_fetch(config, query).await
        }
        Command::Providers => list_providers(&config),
    }
}

async fn run_serve(mut config: FolioConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let service = Arc::new(build_service(&config)?);
    let mut server = MetadataServer::start(service, &config.server).await?;
    println!("folio v{} listening on http://{}", env!("CARGO_PKG_VERSION"), server.addr());

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutting down");
        }
        () = server.wait() => warn!("metadata server stopped unexpectedly"),
    }
    server.shutdown();
    Ok(())
}

async fn run_fetch(config: FolioConfig, query: MetadataQuery) -> anyhow::Result<()> {
    if !query.has_search_terms() {
        anyhow::bail!("give at least one of --title, --author or --isbn");
    }
    let service = build_service(&config)?;
    match service.fetch(&query).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => {
            eprintln!("no metadata found");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn list_providers(config: &FolioConfig) -> anyhow::Result<()> {
    let service = build_service(config)?;
    for provider in service.orchestrator().registry().all() {
        let info = provider.source_info();
        let state = if provider.is_enabled() { "enabled" } else { "disabled" };
        println!("{:<14} {:<9} {}  ({})", info.id, state, info.name, info.base_url);
    }
    Ok(())
}
