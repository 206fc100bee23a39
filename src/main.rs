//! Oracle-gated reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ policy::engine ──▶ inspect (snapshot, body)
//!                                             │
//!                                             ▼
//!                                      oracle (prompt → query → verdict)
//!                                             │
//!                          allowed ◀──────────┴──────────▶ blocked
//!                             │                               │
//!                             ▼                               ▼
//!                      http::forward ──▶ Upstream       403 rejection
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use oracle_waf::config::loader::{finalize, read_config};
use oracle_waf::config::{PromptMode, ProxyConfig};
use oracle_waf::lifecycle::{signals, Shutdown};
use oracle_waf::observability::{logging, metrics};
use oracle_waf::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "oracle-waf")]
#[command(about = "Reverse proxy that asks an LLM oracle to screen every request", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream base URL, e.g. http://127.0.0.1:3000
    #[arg(short, long)]
    target: Option<String>,

    /// Oracle generate endpoint
    #[arg(long)]
    oracle_url: Option<String>,

    /// Oracle model name
    #[arg(long)]
    model: Option<String>,

    /// Oracle timeout in seconds
    #[arg(long)]
    oracle_timeout: Option<u64>,

    /// Prompt mode: full or body_only
    #[arg(long)]
    prompt_mode: Option<PromptMode>,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(target) = self.target {
            config.upstream.target_url = Some(target);
        }
        if let Some(url) = self.oracle_url {
            config.oracle.endpoint = url;
        }
        if let Some(model) = self.model {
            config.oracle.model = model;
        }
        if let Some(secs) = self.oracle_timeout {
            config.oracle.timeout_secs = secs;
        }
        if let Some(mode) = self.prompt_mode {
            config.oracle.prompt_mode = mode;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    let config = finalize(config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "oracle-waf starting");

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        target = ?config.upstream.target_url,
        oracle = %config.oracle.endpoint,
        model = %config.oracle.model,
        prompt_mode = ?config.oracle.prompt_mode,
        oracle_timeout_secs = config.oracle.timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
