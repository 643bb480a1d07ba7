use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use hololith_engine::Engine;
use hololith_server::api::{self, AppState};
use hololith_server::config::HololithConfig;
use hololith_server::store_factory::create_repository;

/// Hololith storefront HTTP server.
#[derive(Parser, Debug)]
#[command(name = "hololith-server", about = "HTTP server for the Hololith storefront backend")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "hololith.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run migrations for the configured store backend, then exit.
    Migrate,
    /// Upsert the built-in plans and tags, then exit.
    Seed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Missing file means all defaults.
    let config = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        HololithConfig::from_toml(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        HololithConfig::from_toml("")?
    };

    let repo = create_repository(&config.store).await?;
    info!(backend = %config.store.backend, "store initialized");

    if let Some(Commands::Migrate) = cli.command {
        info!("migrations complete");
        return Ok(());
    }

    let engine = Engine::builder(repo).build();

    if matches!(cli.command, Some(Commands::Seed)) || config.seed.enabled {
        let report = engine.seed().await?;
        info!(
            plans = report.plans,
            tags_created = report.tags_created,
            "seed catalog applied"
        );
        if let Some(Commands::Seed) = cli.command {
            return Ok(());
        }
    }

    if config.server.is_production() && config.auth.access_secret.starts_with("dev-") {
        warn!("running in production with the development access secret");
    }

    let state = AppState::new(engine, &config);
    let app = api::router(state);

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        address = %addr,
        api_prefix = %config.server.api_prefix,
        environment = %config.server.environment,
        "hololith-server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("hololith-server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
