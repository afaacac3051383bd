//! Configuration management for the session hub.
//!
//! This module handles loading, validation, and conversion of hub configuration
//! from TOML files, command-line arguments and the environment.

use crate::cli::CliArgs;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use session_hub::config::DEFAULT_WELCOME_MESSAGE;
use session_hub::queue::DEFAULT_QUEUE_NAME;
use session_hub::{InMemoryQueue, MatchmakingQueue, ServerConfig, SqliteQueue};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides `server.worker_secret`.
pub const WORKER_SECRET_ENV: &str = "HUB_WORKER_SECRET";

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network and credential settings
    pub server: ServerSettings,
    /// Keepalive and activity timing
    #[serde(default)]
    pub liveness: LivenessSettings,
    /// Matchmaking queue backend
    #[serde(default)]
    pub queue: QueueSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the hub to (e.g., "0.0.0.0:5555")
    pub bind_address: String,
    /// Maximum number of concurrent connections, players and workers together
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Token a worker must present on connect
    #[serde(default)]
    pub worker_secret: String,
    /// Text sent in reply to CONNECTED
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    /// Presence log period in seconds (0 to disable)
    #[serde(default = "default_presence_interval")]
    pub presence_interval_secs: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_welcome_message() -> String {
    DEFAULT_WELCOME_MESSAGE.to_string()
}

fn default_presence_interval() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessSettings {
    /// HEARTBEAT period in milliseconds
    pub heartbeat_interval_ms: u64,
    /// A player is active if heard from within this many milliseconds
    pub activity_window_ms: u64,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 5_000,
            activity_window_ms: 30_000,
        }
    }
}

/// Which queue implementation backs matchmaking.
///
/// `memory` loses waiting players on restart and cannot be reached by an
/// out-of-process matcher, so only use it for local experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    pub backend: QueueBackend,
    /// Queue name shared with the matcher
    pub name: String,
    /// Database file, used by the `sqlite` backend
    pub path: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Sqlite,
            name: DEFAULT_QUEUE_NAME.to_string(),
            path: "data/matchmaking.db".to_string(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:5555".to_string(),
                max_connections: default_max_connections(),
                worker_secret: String::new(),
                welcome_message: default_welcome_message(),
                presence_interval_secs: default_presence_interval(),
            },
            liveness: LivenessSettings::default(),
            queue: QueueSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration file is written at
    /// `path` and the defaults are returned.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(WORKER_SECRET_ENV).filter(|s| !s.is_empty()) {
            self.server.worker_secret = secret;
        }
    }

    /// Applies command-line overrides, which win over file and environment.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(secret) = &args.worker_secret {
            self.server.worker_secret = secret.clone();
        }
        if let Some(path) = &args.queue_path {
            self.queue.backend = QueueBackend::Sqlite;
            self.queue.path = path.to_string_lossy().to_string();
        }
    }

    /// Checks the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            bail!("Invalid bind address: {}", self.server.bind_address);
        }

        if self.server.worker_secret.is_empty() {
            bail!(
                "server.worker_secret must be set (config file, --worker-secret or {})",
                WORKER_SECRET_ENV
            );
        }

        if self.server.max_connections == 0 {
            bail!("server.max_connections must be greater than zero");
        }

        if self.liveness.heartbeat_interval_ms == 0 {
            bail!("liveness.heartbeat_interval_ms must be greater than zero");
        }
        if self.liveness.activity_window_ms == 0 {
            bail!("liveness.activity_window_ms must be greater than zero");
        }

        if self.queue.name.is_empty() {
            bail!("queue.name cannot be empty");
        }
        if self.queue.backend == QueueBackend::Sqlite && self.queue.path.is_empty() {
            bail!("queue.path is required for the sqlite backend");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            );
        }

        Ok(())
    }

    /// Converts the application configuration into the library's `ServerConfig`.
    pub fn to_server_config(&self) -> Result<ServerConfig> {
        let bind_address: SocketAddr = self
            .server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;

        Ok(ServerConfig::new(bind_address, self.server.worker_secret.clone())
            .with_max_connections(self.server.max_connections)
            .with_welcome_message(self.server.welcome_message.clone())
            .with_heartbeat_interval(Duration::from_millis(self.liveness.heartbeat_interval_ms))
            .with_activity_window(Duration::from_millis(self.liveness.activity_window_ms))
            .with_presence_interval(Duration::from_secs(self.server.presence_interval_secs)))
    }

    /// Opens the configured queue backend.
    pub async fn build_queue(&self) -> Result<Arc<dyn MatchmakingQueue>> {
        match self.queue.backend {
            QueueBackend::Memory => Ok(Arc::new(InMemoryQueue::with_name(self.queue.name.clone()))),
            QueueBackend::Sqlite => {
                let path = PathBuf::from(&self.queue.path);
                let queue = SqliteQueue::open_named(self.queue.name.clone(), &path)
                    .await
                    .with_context(|| format!("Failed to open queue database {}", path.display()))?;
                Ok(Arc::new(queue))
            }
        }
    }
}
