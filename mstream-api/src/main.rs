//! mstream-api - Music streaming backend service
//!
//! Resolves configuration, connects the storage client, login-service
//! validator and media pipeline, then serves the HTTP API until Ctrl+C or
//! SIGTERM.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mstream_api::media::{FfmpegConverter, MediaPipeline, YtDlpSource};
use mstream_api::store::SqliteStore;
use mstream_api::{build_router, AppState, HttpLimits};
use mstream_common::auth::LoginServiceValidator;
use mstream_common::config::{ConfigOverrides, ServiceConfig, TomlConfig};
use mstream_common::db::init_database;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mstream-api
///
/// Every option falls back to an environment variable, then to the TOML
/// config file, then to the compiled default.
#[derive(Parser, Debug)]
#[command(name = "mstream-api")]
#[command(about = "Music streaming backend: tracks, playlists and audio storage")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "MSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "MSTREAM_BIND")]
    bind: Option<SocketAddr>,

    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Location of the external login service (host:port or URL)
    #[arg(long, env = "LOGIN_URL")]
    login_url: Option<String>,

    /// ffmpeg binary used by the deprecated ingest endpoints
    #[arg(long, env = "MSTREAM_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// yt-dlp binary used by the deprecated ingest endpoints
    #[arg(long, env = "MSTREAM_YT_DLP")]
    yt_dlp: Option<PathBuf>,

    /// Directory for transient download and conversion files
    #[arg(long, env = "MSTREAM_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, env = "MSTREAM_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Grace period for in-flight requests on shutdown, in seconds
    #[arg(long, env = "MSTREAM_SHUTDOWN_GRACE_SECS")]
    shutdown_grace_secs: Option<u64>,

    /// Maximum request body size in bytes
    #[arg(long, env = "MSTREAM_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "MSTREAM_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_addr: self.bind,
            database_url: self.database_url.clone(),
            login_url: self.login_url.clone(),
            ffmpeg_path: self.ffmpeg.clone(),
            yt_dlp_path: self.yt_dlp.clone(),
            temp_dir: self.temp_dir.clone(),
            request_timeout_secs: self.request_timeout_secs,
            shutdown_grace_secs: self.shutdown_grace_secs,
            max_upload_bytes: self.max_upload_bytes,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml, config_source) = TomlConfig::load_for_run(args.config.as_deref())
        .context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), toml)
        .context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting mstream-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let pool = init_database(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Connected to database");

    let http_client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    if config.login_url.is_empty() {
        warn!("LOGIN_URL is not set: every protected request will be rejected");
    } else {
        info!("Login service: {}", config.login_url);
    }

    let media = MediaPipeline::new(
        Arc::new(YtDlpSource::new(&config.yt_dlp_path, http_client.clone())),
        Arc::new(FfmpegConverter::new(&config.ffmpeg_path)),
        &config.temp_dir,
    );

    let state = AppState::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(LoginServiceValidator::new(http_client, &config.login_url)),
        Arc::new(media),
    );
    let app = build_router(state, HttpLimits::from(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("mstream-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            result.context("Server task panicked")?.context("Server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    // Stop accepting connections, then give in-flight requests the grace period
    let _ = stop_tx.send(());
    match tokio::time::timeout(config.shutdown_grace, server).await {
        Ok(result) => {
            result.context("Server task panicked")?.context("Server error")?;
            info!("Server shutdown complete");
        }
        Err(_) => {
            warn!(
                "In-flight requests still running after {:?}, forcing shutdown",
                config.shutdown_grace
            );
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
