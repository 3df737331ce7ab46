//! ami-client: command-line monitor for an Asterisk Manager Interface.
//!
//! Connects, logs in, and prints manager messages until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! ami-client [OPTIONS]
//!
//! Options:
//!   --config   <PATH>   Configuration file [default: platform config dir]
//!   --address  <ADDR>   Manager host:port (overrides the file)
//!   --username <USER>   Login user name (overrides the file)
//!   --secret   <SECRET> Login secret (overrides the file)
//!   --event    <NAME>   Print only this event; repeatable
//!   --json              Print one JSON object per message
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable       | Description                     |
//! |----------------|---------------------------------|
//! | `AMI_CONFIG`   | Configuration file path         |
//! | `AMI_ADDRESS`  | Manager `host:port`             |
//! | `AMI_USERNAME` | Login user name                 |
//! | `AMI_SECRET`   | Login secret                    |
//! | `RUST_LOG`     | Log filter; wins over the file  |
//!
//! The process exits non-zero when the connection cannot be established,
//! the login is rejected, or the connection is lost while monitoring.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ami_client::infrastructure::storage::config::{self, AppConfig, ConfigError};
use ami_client::{AmiConnection, ConnectionConfig};
use ami_core::Message;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Asterisk Manager Interface monitor.
#[derive(Debug, Parser)]
#[command(
    name = "ami-client",
    about = "Connects to an Asterisk Manager Interface and prints its messages",
    version
)]
struct Cli {
    /// Configuration file.  Defaults to `config.toml` in the platform config
    /// directory; a missing file means built-in defaults.
    #[arg(long, env = "AMI_CONFIG")]
    config: Option<PathBuf>,

    /// Manager address as `host:port`.
    #[arg(long, env = "AMI_ADDRESS")]
    address: Option<String>,

    /// Login user name.
    #[arg(long, env = "AMI_USERNAME")]
    username: Option<String>,

    /// Login secret.
    #[arg(long, env = "AMI_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Print only events with this name.  May be given more than once.
    /// Without it every message is printed.
    #[arg(long = "event", value_name = "NAME")]
    events: Vec<String>,

    /// Print messages as JSON objects instead of the padded text layout.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Reads the configuration file named by `--config`, or the default one.
    fn load_app_config(&self) -> anyhow::Result<AppConfig> {
        let loaded = match &self.config {
            Some(path) => config::load_config_from(path),
            None => config::load_config(),
        };
        match loaded {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
            Err(e) => Err(e).context("could not load configuration"),
        }
    }

    /// Applies the command-line overrides on top of the file values.
    fn connection_config(&self, app: &AppConfig) -> ConnectionConfig {
        let mut cfg = ConnectionConfig::from(&app.connection);
        if let Some(address) = &self.address {
            cfg.address = address.clone();
        }
        if let Some(username) = &self.username {
            cfg.username = username.clone();
        }
        if let Some(secret) = &self.secret {
            cfg.secret = secret.clone();
        }
        cfg
    }
}

fn render(msg: &Message, json: bool) -> String {
    if json {
        serde_json::to_string(msg).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    } else {
        msg.to_string()
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = cli.load_app_config()?;

    // RUST_LOG wins; otherwise the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.log_level)),
        )
        .init();

    let conn_config = cli.connection_config(&app_config);
    info!("ami-client starting (manager {})", conn_config.address);

    let conn = AmiConnection::connect(conn_config)
        .await
        .context("could not connect to the manager")?;

    // ── Output handlers ───────────────────────────────────────────────────────
    let json = cli.json;
    let print: Arc<dyn Fn(Message) + Send + Sync> =
        Arc::new(move |msg: Message| println!("{}", render(&msg, json)));
    if cli.events.is_empty() {
        let print = Arc::clone(&print);
        conn.set_default_handler(move |msg| print(msg));
    } else {
        for name in &cli.events {
            let print = Arc::clone(&print);
            conn.register_event_handler(name.clone(), move |msg| print(msg));
        }
    }

    // ── Failure reporting ─────────────────────────────────────────────────────
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();
    conn.set_network_error_handler(move |err| {
        let _ = failure_tx.send(err.to_string());
    });

    let dispatch = conn.start().context("could not start the dispatch loop")?;
    conn.login().await.context("login failed")?;
    info!("monitoring; press Ctrl+C to stop");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("could not listen for Ctrl+C: {e}");
            }
            info!("shutting down");
            conn.stop();
            dispatch.await.context("dispatch loop task failed")?;
            Ok(())
        }
        failure = failure_rx.recv() => {
            let reason = failure.unwrap_or_else(|| "dispatch loop ended".to_string());
            Err(anyhow!("connection to the manager lost: {reason}"))
        }
    }
}
