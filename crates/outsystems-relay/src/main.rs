mod config;
mod error;
mod extract;
mod mapping;
mod model;
mod resolver;
mod server;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lookup_common::upstream::LookupClient;

use config::Config;
use mapping::{FieldMappingTable, OUTPUT_FIELDS};
use resolver::FieldResolver;
use server::AppState;

/// Relay that reshapes basic type lookups into the OutSystems document.
#[derive(Parser, Debug)]
#[command(name = "outsystems-relay", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP relay (default)
    Serve,
    /// Look up one basic type and print the restructured JSON
    Extract {
        /// Basic type to look up; defaults to RELAY_DEFAULT_BASIC_TYPE
        basic_type: Option<String>,

        /// Also print the category/parameter layout to stderr
        #[arg(long)]
        show_structure: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_env()?;
    info!(
        base_url = %config.lookup.base_url,
        timeout_ms = config.lookup.timeout.as_millis(),
        max_retries = config.lookup.max_retries,
        "lookup client configured"
    );
    let client = LookupClient::new(config.lookup.clone())?;
    let resolver = FieldResolver::new(FieldMappingTable::builtin(), OUTPUT_FIELDS);
    info!(
        output_fields = resolver.fields().len(),
        mapped = resolver.table().len(),
        "field mapping loaded"
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, client, resolver).await,
        Command::Extract {
            basic_type,
            show_structure,
        } => {
            let basic_type = basic_type
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| config.default_basic_type.clone());
            let mut stderr = std::io::stderr();
            let mut stdout = std::io::stdout();
            let structure = show_structure.then_some(&mut stderr as &mut dyn std::io::Write);
            extract::run(&client, &resolver, &basic_type, structure, &mut stdout).await?;
            Ok(())
        }
    }
}

async fn serve(config: Config, client: LookupClient, resolver: FieldResolver) -> anyhow::Result<()> {
    let state = AppState::new(Arc::new(client), Arc::new(resolver), config.default_basic_type);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "server error"))?;

    info!("relay shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
