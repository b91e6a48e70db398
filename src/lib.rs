pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;
use services::SyncScheduler;
use state::SharedState;

/// Dispatches the command line against an already loaded configuration.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cli = Cli::parse();

    config.validate()?;
    init_tracing(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Sync => cli::cmd_sync(config).await,
        Commands::Init => cli::cmd_init(),
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("onessa v{} starting...", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.general.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", config.general.data_dir))?;

    if config.directory.is_configured() {
        if config.auth.write_api_token.is_none() {
            warn!("WRITE_API_TOKEN is not set: API writes are accepted without a session");
        }
    } else {
        warn!("Directory not configured, authentication and sync disabled");
    }

    if config.uses_default_session_secret() {
        warn!("Using the built-in session secret; set SESSION_SECRET in production");
    }

    let listen_addr = config.server.listen_addr.clone();

    let shared = Arc::new(
        SharedState::new(config)
            .await
            .context("Failed to initialize application state")?,
    );

    let shutdown = CancellationToken::new();

    let scheduler = SyncScheduler::new(shared.reconciler.clone(), &shared.config.sync);
    let scheduler_handle = scheduler.start(shutdown.clone()).await?;

    let app = api::router(api::create_app_state(shared));
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;

    info!("Web server running at http://{}", listen_addr);

    let server_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal(server_shutdown).await })
        .await;

    shutdown.cancel();
    scheduler_handle.wait().await;

    if let Err(e) = result {
        error!("Web server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Error listening for shutdown: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Error installing SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Shutdown signal received"),
        () = terminate => info!("Terminate signal received"),
        () = token.cancelled() => {}
    }

    token.cancel();
}
