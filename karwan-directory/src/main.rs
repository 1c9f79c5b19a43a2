//! karwan-directory - Karwan-e-Tijarat professional directory service
//!
//! Startup order: arguments, tracing, build banner, config resolution,
//! database preparation, then the HTTP server until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use karwan_common::config::{
    default_config_path, load_toml_config, ConfigOverrides, DirectoryConfig,
};
use karwan_common::db::init::init_database;
use karwan_common::db::models::IdentityPolicy;
use karwan_common::db::profiles;
use karwan_directory::api::AdminGate;
use karwan_directory::directory::Directory;
use karwan_directory::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for karwan-directory
#[derive(Parser, Debug)]
#[command(name = "karwan-directory")]
#[command(about = "Karwan-e-Tijarat professional directory service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "KARWAN_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "KARWAN_DATABASE")]
    database: Option<PathBuf>,

    /// Prefix of share references, e.g. https://karwan.streamlit.app
    #[arg(long, env = "KARWAN_BASE_URL")]
    base_url: Option<String>,

    /// Credential for the admin export routes (disabled when unset)
    #[arg(long, env = "KARWAN_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// `email` or `email_and_phone`
    #[arg(long, env = "KARWAN_IDENTITY_POLICY")]
    identity_policy: Option<IdentityPolicy>,

    /// Listen address
    #[arg(short, long, env = "KARWAN_BIND")]
    bind: Option<String>,

    /// Title printed at the top of profile documents
    #[arg(long, env = "KARWAN_DOCUMENT_TITLE")]
    document_title: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "KARWAN_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database: self.database.clone(),
            base_url: self.base_url.clone(),
            admin_password: self.admin_password.clone(),
            identity_policy: self.identity_policy,
            bind: self.bind.clone(),
            document_title: self.document_title.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Installed before config loading so its warnings are kept; the
    // configured level is applied once known unless RUST_LOG is set.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let rust_log_set = env_filter.is_some();
    let initial_level = args.log_level.clone().unwrap_or_else(|| "info".to_string());
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(&initial_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any config or database delay
    info!(
        "Starting Karwan-e-Tijarat directory (karwan-directory) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let file = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_toml_config(&path).context("Failed to load config file")?,
        None => {
            info!("No config directory on this platform - using defaults");
            None
        }
    };
    let config = DirectoryConfig::resolve(args.overrides(), file).context("Invalid configuration")?;

    if !rust_log_set && config.log_level != initial_level {
        filter_handle
            .reload(EnvFilter::new(&config.log_level))
            .context("Failed to apply configured log level")?;
    }

    info!("Database path: {}", config.database_path.display());
    info!("Identity policy: {}", config.identity_policy);
    info!("Share base URL: {}", config.base_url);

    let pool = init_database(&config.database_path, config.identity_policy)
        .await
        .context("Failed to prepare database")?;
    info!(
        "✓ Database ready ({} profiles)",
        profiles::count(&pool).await.context("Failed to count profiles")?
    );

    let admin_gate = AdminGate::new(config.admin_password.as_deref());
    if admin_gate.is_enabled() {
        info!("Admin export enabled");
    } else {
        warn!("No admin password configured - admin export disabled");
    }

    let directory = Directory::new(pool.clone(), config.identity_policy, config.document_title.clone());
    let state = AppState::new(directory, config.base_url.clone(), admin_gate);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("karwan-directory listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
