//! Sluice MCP server.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sluice::{
    auth::AuthConfig,
    chat::{ChatApi, SlackClient},
    config::Config,
    create_app_with_config,
    directory::{spawn_refresh_task, DirectoryStore, JsonDirectoryStore},
    state::{AppState, TransportSettings},
    tools::{chat::chat_tools, register_tools, ToolRegistry},
};

/// Sluice - MCP server over HTTP+SSE exposing chat workspace tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory cache file
    #[arg(long)]
    directory_cache: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long)]
    log_level: Option<String>,

    /// Do not run the periodic directory refresh
    #[arg(long)]
    no_directory_refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(args.port, args.directory_cache, args.log_level)
        .context("Failed to load configuration")?;
    let _log_guard = init_logging(&config)?;

    info!("Starting Sluice MCP server v{}...", env!("CARGO_PKG_VERSION"));

    let slack = SlackClient::new(
        &config.chat_base_url,
        config.chat_bot_token.clone(),
        config.chat_request_timeout,
    )?;
    if !slack.has_token() {
        warn!("No chat bot token configured (SLACK_BOT_TOKEN), chat tools will fail");
    }
    let chat: Arc<dyn ChatApi> = Arc::new(slack);
    let directory: Arc<dyn DirectoryStore> =
        Arc::new(JsonDirectoryStore::new(&config.directory_cache_path));

    let mut tools = ToolRegistry::new();
    let report = register_tools(&mut tools, chat_tools(chat.clone(), directory.clone()));
    info!(
        "{} tool(s) registered, {} skipped",
        report.registered,
        report.skipped.len()
    );

    let state = AppState::with_tools(
        tools,
        TransportSettings {
            queue_capacity: config.queue_capacity,
            keep_alive: config.keep_alive,
        },
    );
    let app = create_app_with_config(
        state.clone(),
        AuthConfig::from_env(),
        config.cors_allowed_origins.clone(),
    );

    let shutdown = CancellationToken::new();
    let refresh_task = match config.directory_refresh_interval {
        Some(every) if !args.no_directory_refresh && config.chat_bot_token.is_some() => {
            info!(
                "Directory cache at {:?}, refreshing every {:?}",
                config.directory_cache_path, every
            );
            Some(spawn_refresh_task(
                chat.clone(),
                directory.clone(),
                every,
                shutdown.clone(),
            ))
        }
        _ => {
            info!("Directory refresh disabled");
            None
        }
    };

    // Bind to 0.0.0.0 to be accessible from all interfaces (Docker, network, etc.)
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    let shutdown_signal = {
        let shutdown = shutdown.clone();
        let state = state.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.cancel();
            // Open SSE streams would otherwise hold graceful shutdown forever.
            state.sessions().close_all();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    shutdown.cancel();
    if let Some(task) = refresh_task {
        if let Err(e) = task.await {
            error!("Directory refresh task failed: {}", e);
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Set up stdout logging plus an optional log file.
///
/// Filter priority: RUST_LOG, then `logging.log_level`, then `info`.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or("info")))
        .context("Invalid log level")?;

    let stdout_layer = fmt::layer().with_target(false).compact();

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path {:?} has no file name", path))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(UtcTime::new(Rfc3339));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
