//! # Captcha Gate server
//!
//! Sidecar exposing token verification, widget metadata, and one gated
//! endpoint per declared action.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use captcha_gate::config::ConfigResolver;
use captcha_gate::policy::PolicyStore;
use captcha_gate::routes;
use captcha_gate::service::CaptchaService;
use captcha_gate::settings::AppConfig;
use captcha_gate::state::AppState;

/// Captcha Gate - per-action CAPTCHA verification
#[derive(Parser, Debug)]
#[command(name = "captcha-gate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/captcha-gate.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Dotenv file loaded before the environment is read
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Development bootstrap; a missing file is fine
    let env_loaded = dotenvy::from_filename(&args.env_file).is_ok();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Captcha Gate v{}", env!("CARGO_PKG_VERSION"));
    if env_loaded {
        info!(path = %args.env_file, "Environment file loaded");
    }

    let config = AppConfig::load(&args.config, args.listen.as_deref())?;
    info!(path = %args.config, "Configuration loaded");

    let resolver = Arc::new(ConfigResolver::from_env());
    let policies = Arc::new(PolicyStore::new(resolver.clone()));
    let service = CaptchaService::new(policies.clone(), resolver.clone())
        .await
        .context("Captcha service misconfigured")?;
    info!(
        provider = %service.provider(),
        source = resolver.source_name().unwrap_or("unknown"),
        "Verification service initialized"
    );

    let actions = policies.current().await.context("Failed to load policy")?;
    let state = AppState::new(config.clone(), Arc::new(service));
    let app = routes::create_router(state, &actions.action_names());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Captcha Gate listening on {}", config.listen_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Captcha Gate shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?;
    }

    Ok(())
}
