//! askrelay server
//!
//! Loopback HTTP service that forwards `/ask` prompts to the agent CLI.
//! A reverse proxy in front of it handles TLS and public routing.

use std::net::SocketAddr;
use std::path::PathBuf;

use askrelay_core::RelayConfig;
use askrelay_core::config::{DEFAULT_AGENT_BIN, DEFAULT_AGENT_HOME, DEFAULT_PORT};
use askrelay_core::tracing_init::{LogFormat, default_directive, init_tracing};
use askrelay_server::{AppState, build_router};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "askrelay-server")]
#[command(version, about = "HTTP relay from /ask to the agent CLI")]
struct Args {
    /// Port to listen on (always bound to 127.0.0.1)
    #[arg(long, default_value_t = DEFAULT_PORT, env = "AI_PORT")]
    port: u16,

    /// Path to the agent CLI binary
    #[arg(long, default_value = DEFAULT_AGENT_BIN, env = "AGENT_CLI_PATH")]
    agent_bin: PathBuf,

    /// Project root the agent works in (defaults to the current directory)
    #[arg(long, env = "AI_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// HOME directory for the agent process
    #[arg(long, default_value = DEFAULT_AGENT_HOME, env = "AI_AGENT_HOME")]
    agent_home: PathBuf,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "AI_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "AI_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(
        &default_directive("askrelay_server", &args.log_level),
        LogFormat::from_json_flag(args.log_json),
    );

    let project_dir = match args.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = RelayConfig::new(project_dir, args.agent_bin)
        .with_port(args.port)
        .with_agent_home(args.agent_home)
        .validate()?;
    config.enter_project_dir()?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        project_dir = %config.project_dir.display(),
        agent_bin = %config.agent_bin.display(),
        model = %config.model,
        timeout_secs = config.timeout.as_secs(),
        max_prompt_chars = config.max_prompt_chars,
        "Starting askrelay-server"
    );

    let app = build_router(AppState::new(config));

    // The `true` parameter unsets $NOTIFY_SOCKET so agent processes
    // don't inherit it. No-op when not started by systemd.
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("askrelay-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}
