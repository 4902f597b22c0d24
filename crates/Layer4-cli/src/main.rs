//! AgentPod - Main entry point

mod server;

use agentpod_foundation::PodConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AgentPod - browser automation task coordinator
#[derive(Parser, Debug)]
#[command(name = "agentpod")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to ./agentpod.toml and the global config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Remote automation worker URL (overrides AGENTPOD_ENGINE_URL)
    #[arg(long)]
    engine_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(&args)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(config).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Defaults, then file, then environment, then command line
fn load_config(args: &Args) -> anyhow::Result<PodConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = PodConfig::load_from(path)?;
            config.apply_env();
            config
        }
        None => PodConfig::load()?,
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = &args.engine_url {
        config.engine.endpoint = Some(url.clone());
    }
    Ok(config)
}
