use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use routekit::{AxumRouter, ControllerState, RouteRegistry, RoutekitConfig, TreeAssembler};

mod controllers;

/// RouteKit demo server - assembles the registered controllers and serves them
#[derive(Parser)]
#[command(name = "routekit-demo")]
#[command(about = "RouteKit demo server - assembles registered controllers and serves them")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8087")]
    bind: SocketAddr,

    /// Log verbosity level (-v debug, -vv trace); overrides the configured level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the route tree and serve it
    Run,
    /// Assemble the route tree, print where each controller landed, and exit
    Check,
}

fn init_logging(config: &RoutekitConfig, verbose: u8) {
    let level = match verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Layered config: defaults -> YAML (if provided) -> env (ROUTEKIT__*)
    let config = RoutekitConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config, cli.verbose);

    let assembler = TreeAssembler::new(RouteRegistry::discover())
        .with_default_options(config.default_router_options.clone());
    let app = AxumRouter::new();
    let tree = assembler
        .apply_routes(&app)
        .context("assembling route tree")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => {
            for (controller, state) in tree.states() {
                let root = assembler
                    .registry()
                    .controller(controller)
                    .map(|spec| spec.root.as_str())
                    .unwrap_or_default();
                match state {
                    ControllerState::Root => println!("{controller:<24} {root:<12} mounted on app"),
                    ControllerState::Child { parent } => {
                        println!("{controller:<24} {root:<12} mounted under {parent}")
                    }
                    ControllerState::Skipped => println!("{controller:<24} {root:<12} skipped"),
                }
            }
            Ok(())
        }
        Commands::Run => {
            let listener = tokio::net::TcpListener::bind(cli.bind)
                .await
                .with_context(|| format!("binding {}", cli.bind))?;
            tracing::info!(addr = %cli.bind, "RouteKit demo listening");
            axum::serve(listener, app.into_router())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("serving HTTP")?;
            tracing::info!("RouteKit demo stopped");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
