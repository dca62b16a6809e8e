//! # wfpd
//!
//! REST server dispatching WFP fingerprint scans to the external scan
//! engine.
//!
//! ## Overview
//!
//! - **Direct scans**: one multipart upload, split into batches, fanned out
//!   across a worker pool, reassembled into a single JSON response
//! - **Batch sessions**: chunked uploads accumulated per session id and
//!   dispatched on the final chunk
//! - **Engine lookups**: file contents, SBOM attribution, license
//!   obligations
//! - **Operational surface**: health checks, request metrics, optional TLS
//!   and source IP filtering

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wfpd_core::{EngineClient, ProcessEngine};
use wfpd_server::{AppState, routes};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "wfpd-server")]
#[command(about = "REST server dispatching WFP fingerprint scans across a scan engine worker pool")]
struct Cli {
    /// Server port (overrides config)
    #[arg(short, long, env = "APP_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "APP_ADDR")]
    host: Option<String>,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, env = "SCAN_TLS_CERT")]
    cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, env = "SCAN_TLS_KEY")]
    key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let load = wfpd_config::load()?;
    let mut config = load.config;
    if let Some(port) = args.port {
        config.app.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.app.addr = host;
    }
    if args.cert.is_some() {
        config.tls.cert_file = args.cert.clone();
    }
    if args.key.is_some() {
        config.tls.key_file = args.key.clone();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                if config.app.trace {
                    "debug,tower_http=debug".into()
                } else if config.app.debug {
                    "debug,tower_http=warn".into()
                } else {
                    "info,tower_http=warn".into()
                }
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if load.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in &load.warnings {
        warn!(message = %warning, "configuration warning");
    }

    info!(
        binary = %config.scanning.binary,
        workers = config.scanning.workers,
        grouping = config.scanning.grouping,
        timeout_secs = config.scanning.scan_timeout_secs,
        hpsm_enabled = config.scanning.hpsm_enabled,
        "scan engine configuration"
    );

    let session_dir = config.scanning.session_dir();
    std::fs::create_dir_all(&session_dir)?;
    if let Some(wfp_dir) = config.scanning.wfp_dir.as_ref() {
        std::fs::create_dir_all(wfp_dir)?;
    }

    let engine: Arc<dyn EngineClient> = Arc::new(
        ProcessEngine::new(config.scanning.binary.clone(), config.scanning.scan_timeout())
            .with_wfp_dir(config.scanning.wfp_dir.clone())
            .with_debug(config.app.debug)
            .with_enforced_flags(config.scanning.flags)
            .with_tmp_file_delete(config.scanning.tmp_file_delete)
            .with_keep_failed_wfps(config.scanning.keep_failed_wfps),
    );

    // The engine is probed once at startup; a failure is worth shouting
    // about but must not stop the server from coming up.
    if let Err(e) = engine.health().await {
        warn!("scan engine health probe failed: {e}");
    }

    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), engine);
    let router = routes::create_router(state);

    let host: IpAddr = if config.app.addr.trim().is_empty() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        config.app.addr.parse()?
    };
    let addr = SocketAddr::new(host, config.app.port);
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    if config.tls.enabled() {
        let (cert, key) = (
            config.tls.cert_file.clone().unwrap_or_default(),
            config.tls.key_file.clone().unwrap_or_default(),
        );
        info!(cert = %cert.display(), key = %key.display(), "TLS enabled");
        info!("starting scan API server (HTTPS) on {addr}");
        let rustls_config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
        axum_server::bind_rustls(addr, rustls_config)
            .serve(make_service)
            .await?;
    } else {
        info!("starting scan API server (HTTP) on {addr}");
        warn!(
            "TLS is not configured. For production use, set SCAN_TLS_CERT and SCAN_TLS_KEY environment variables."
        );
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, make_service)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
    }
    info!("shutdown signal received");
}
