use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use backend_lib::{
    config::{Settings, StorageBackend, DEFAULT_CONFIG_FILE},
    create_router,
    storage::{FlatFileStorage, MemoryStorage, Storage},
    AppState,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RBAC REST API server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the bind address from the config
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Override the log level from the config
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        settings.server.bind_addr = bind;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
        settings.validate()?;
    }

    init_tracing(&settings);

    if settings.auth.jwt_secret == Settings::default().auth.jwt_secret {
        warn!("auth.jwt_secret is the built-in default; set RBAC_AUTH__JWT_SECRET");
    }

    match settings.storage.backend {
        StorageBackend::Memory => serve(MemoryStorage::new(), settings).await,
        StorageBackend::FlatFile => {
            let storage = FlatFileStorage::new(&settings.storage.data_dir).with_context(|| {
                format!(
                    "failed to open data directory {}",
                    settings.storage.data_dir.display()
                )
            })?;
            serve(storage, settings).await
        },
    }
}

async fn serve<S: Storage + 'static>(storage: S, settings: Settings) -> anyhow::Result<()> {
    let addr = settings.server.bind_addr;
    let state = Arc::new(AppState::new(storage, settings)?);

    if let Some(seed) = state.settings.admin.clone() {
        state.seed_admin(&seed).await?;
    }

    let app = create_router(state.clone());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, prefix = %state.settings.server.api_prefix, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
