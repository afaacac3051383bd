//! Main application entry point for the session hub.
//!
//! Loads configuration, installs logging, opens the matchmaking queue and
//! runs the hub until SIGINT/SIGTERM.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{Context, Result};
use cli::CliArgs;
use config::AppConfig;
use session_hub::HubServer;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

/// How long open sockets get to close after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Main application struct.
pub struct Application {
    config: AppConfig,
    server: Arc<HubServer>,
}

impl Application {
    /// Loads configuration (file, then environment, then CLI), sets up
    /// logging and builds the server.
    pub async fn new(args: CliArgs) -> Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_cli(&args);
        config
            .validate()
            .context("Configuration validation failed")?;

        logging::setup_logging(&config.logging.level, config.logging.json_format)?;

        let version = env!("CARGO_PKG_VERSION");
        info!("🚀 Session Hub v{}", version);
        info!("📂 Config: {}", args.config_path.display());

        let queue = config.build_queue().await?;
        let server = Arc::new(HubServer::new(config.to_server_config()?, queue));

        Ok(Self { config, server })
    }

    /// Runs until a shutdown signal arrives or the server fails.
    pub async fn run(self) -> Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  💓 Heartbeat every {}ms, activity window {}ms",
            self.config.liveness.heartbeat_interval_ms, self.config.liveness.activity_window_ms
        );
        info!(
            "  📦 Queue: {:?} '{}'",
            self.config.queue.backend, self.config.queue.name
        );

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move { server.start().await })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            finished = &mut server_handle => {
                finished.context("Server task panicked")??;
                warn!("Server stopped without a shutdown signal");
                return Ok(());
            }
            signal = signals::setup_signal_handlers() => {
                signal?;
            }
        }

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        self.server.shutdown();

        match timeout(SHUTDOWN_GRACE, server_handle).await {
            Ok(joined) => joined.context("Server task panicked")??,
            Err(_) => warn!("⏳ Server did not stop within {:?}", SHUTDOWN_GRACE),
        }

        info!("✅ Session hub shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }
}
