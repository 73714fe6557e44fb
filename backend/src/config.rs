//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::chat::DEFAULT_BASE_URL;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    chat: ChatConfig,
    #[serde(default)]
    directory: DirectoryConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
    /// Seconds between SSE keep-alive comments
    #[serde(default = "default_keep_alive_secs")]
    keep_alive_secs: u64,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            keep_alive_secs: default_keep_alive_secs(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionConfig {
    /// Outbound frames buffered per session before senders wait
    #[serde(default = "default_queue_capacity")]
    queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatConfig {
    #[serde(default = "default_chat_base_url")]
    base_url: String,
    bot_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            bot_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirectoryConfig {
    cache_path: Option<PathBuf>,
    /// Seconds between directory refreshes. 0 disables the refresh task.
    #[serde(default = "default_refresh_interval_secs")]
    refresh_interval_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_port() -> u16 {
    sluice_types::DEFAULT_PORT
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_queue_capacity() -> usize {
    64
}

fn default_chat_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

fn default_directory_cache_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "sluice")
        .map(|dirs| dirs.data_dir().join("directory.json"))
        .unwrap_or_else(|| PathBuf::from("directory.json"))
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
    /// Allowed CORS origins (empty allows any)
    pub cors_allowed_origins: Vec<String>,
    /// Per-session outbound queue capacity
    pub queue_capacity: usize,
    /// Chat Web API base URL
    pub chat_base_url: String,
    /// Chat bot token. Chat tools fail until it is set.
    pub chat_bot_token: Option<String>,
    /// Timeout for chat API requests
    pub chat_request_timeout: Duration,
    /// Directory cache file
    pub directory_cache_path: PathBuf,
    /// Directory refresh interval, `None` when disabled
    pub directory_refresh_interval: Option<Duration>,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides the default but not RUST_LOG)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `config.toml` in user config directory (~/.config/sluice/ on Linux)
    /// 2. `.sluice.toml` in current directory
    ///
    /// Environment variables use the `SLUICE_` prefix with `__` between
    /// section and key, e.g. `SLUICE_SERVER__PORT`. `SLACK_BOT_TOKEN` is
    /// accepted for `chat.bot_token`.
    pub fn from_figment(
        port: Option<u16>,
        directory_cache_path: Option<PathBuf>,
        log_level: Option<String>,
    ) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".sluice.toml"));
        let user_config = directories::ProjectDirs::from("", "", "sluice")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment
            .merge(
                Env::raw()
                    .only(&["SLACK_BOT_TOKEN"])
                    .map(|_| "chat.bot_token".into()),
            )
            .merge(Env::prefixed("SLUICE_").split("__"));

        if let Some(p) = port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref path) = directory_cache_path {
            figment = figment.merge(Serialized::default("directory.cache_path", path));
        }
        if let Some(ref level) = log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }

        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        if file.session.queue_capacity == 0 {
            anyhow::bail!("session.queue_capacity must be at least 1");
        }
        if file.server.keep_alive_secs == 0 {
            anyhow::bail!("server.keep_alive_secs must be at least 1");
        }

        Ok(Self {
            port: file.server.port,
            keep_alive: Duration::from_secs(file.server.keep_alive_secs),
            cors_allowed_origins: file.server.cors_allowed_origins,
            queue_capacity: file.session.queue_capacity,
            chat_base_url: file.chat.base_url,
            chat_bot_token: file.chat.bot_token.filter(|t| !t.trim().is_empty()),
            chat_request_timeout: Duration::from_secs(file.chat.request_timeout_secs.max(1)),
            directory_cache_path: file
                .directory
                .cache_path
                .unwrap_or_else(default_directory_cache_path),
            directory_refresh_interval: match file.directory.refresh_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            keep_alive: Duration::from_secs(default_keep_alive_secs()),
            cors_allowed_origins: Vec::new(),
            queue_capacity: default_queue_capacity(),
            chat_base_url: default_chat_base_url(),
            chat_bot_token: None,
            chat_request_timeout: Duration::from_secs(default_request_timeout_secs()),
            directory_cache_path: default_directory_cache_path(),
            directory_refresh_interval: Some(Duration::from_secs(default_refresh_interval_secs())),
            log_file: None,
            log_level: None,
        }
    }
}
