//! Tiergate CLI Entry Point
//!
//! Subcommands:
//! - `serve` - Tool server over stdio (JSON-RPC 2.0)
//! - `environments` - List configured environments
//! - `check-config` - Validate configuration, optionally probing every environment
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tiergate::engine::mysql::MySqlConnector;
use tiergate::engine::{Connector, StatementClient};
use tiergate::{config, mcp, EnvironmentRegistry, ErrorInfo, Gateway, GateError};

/// Tiergate - Environment-aware database gateway for agents
#[derive(Parser)]
#[command(name = "tiergate")]
#[command(about = "Environment-aware database gateway with tiered write permissions and production redaction")]
#[command(version)]
struct Cli {
    /// Configuration file (skips the local/global lookup)
    #[arg(long, global = true, env = "TIERGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (overrides TIERGATE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve database tools over stdio (JSON-RPC 2.0)
    Serve,

    /// List configured environments and their permission tiers
    Environments,

    /// Validate the configuration
    CheckConfig {
        /// Also connect to and ping every environment
        #[arg(long)]
        probe: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let registry = match load_registry(cli.config.as_deref()) {
        Ok(registry) => registry,
        Err(e) => {
            print_json(&serde_json::json!({ "ok": false, "error": ErrorInfo::from(&e) }))?;
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve => {
            info!("Starting tiergate v{}", env!("CARGO_PKG_VERSION"));
            mcp::serve(Gateway::new(MySqlConnector, registry)).await?;
        }
        Commands::Environments => {
            print_json(&serde_json::json!({
                "ok": true,
                "active": registry.active_id(),
                "production": registry.production_label(),
                "environments": registry.list(),
            }))?;
        }
        Commands::CheckConfig { probe } => {
            let probes = if probe { probe_all(&MySqlConnector, &registry).await } else { Vec::new() };
            let ok = probes.iter().all(|p| p["ok"] == true);
            let sources: Vec<String> = config::sources(cli.config.as_deref())?
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            print_json(&serde_json::json!({
                "ok": ok,
                "sources": sources,
                "environments": registry.len(),
                "active": registry.active_id(),
                "production": registry.production_label(),
                "probes": probes,
            }))?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TIERGATE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_registry(explicit: Option<&std::path::Path>) -> Result<EnvironmentRegistry, GateError> {
    config::load(explicit)?.into_registry()
}

/// Connect to, ping and close every environment
async fn probe_all<C: Connector>(connector: &C, registry: &EnvironmentRegistry) -> Vec<serde_json::Value> {
    let mut results = Vec::with_capacity(registry.len());

    for status in registry.list() {
        let outcome = match registry.validate_target(&status.id) {
            Ok(env) => probe(connector, &env.params).await,
            Err(e) => Err(e),
        };

        results.push(match outcome {
            Ok(()) => serde_json::json!({ "environment": status.id, "ok": true }),
            Err(e) => {
                warn!(environment = %status.id, error = %e, "Probe failed");
                serde_json::json!({ "environment": status.id, "ok": false, "error": ErrorInfo::from(&e) })
            }
        });
    }

    results
}

async fn probe<C: Connector>(connector: &C, params: &tiergate::ConnectionParams) -> Result<(), GateError> {
    let mut client = connector.connect(params).await?;
    let pinged = client.ping().await;
    client.close().await?;
    pinged
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
