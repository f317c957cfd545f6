//! TimeVault request guard (v1)
//!
//! An axum gateway that puts the TimeVault API endpoints behind input
//! sanitization, rate limiting and schema validation.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ security headers ─▶ timeout ─▶ origin check
//!                                                                                 │
//!                                                                                 ▼
//!                                        ┌──────────────────────────────────────────────┐
//!                                        │ validation middleware (per endpoint policy)  │
//!                                        │   rate limit → size → parse → rules → scan   │
//!                                        └──────────────┬──────────────────┬────────────┘
//!                                                       │ rejected         │ accepted
//!                                                       ▼                  ▼
//!     Client Response ◀──────────────── 429 / 413 / 400 JSON      handler (sanitized payload)
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use timevault_guard::config::{load_config, GuardConfig};
use timevault_guard::lifecycle::signals::spawn_signal_handler;
use timevault_guard::lifecycle::Shutdown;
use timevault_guard::net::tls::load_tls_config;
use timevault_guard::observability::logging::{init_logging, LogFormat};
use timevault_guard::observability::metrics::init_metrics;
use timevault_guard::{GuardServer, SecurityManager};

#[derive(Parser)]
#[command(name = "timevault-guard", version, about = "Request validation gateway for the TimeVault API")]
struct Args {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(short, long, env = "TIMEVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(
        &config.observability.log_level,
        LogFormat::from_str_lossy(&config.observability.log_format),
    )?;

    tracing::info!("timevault-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = %args.config.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "<defaults>".to_string()),
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    let manager = Arc::new(SecurityManager::from_env(config.security.clone())?);

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = GuardServer::new(config, manager);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, rustls, shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
