use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gooseconf::GooseConfig;
use goosebin::{app, telemetry, web, BackendKind};
use tokio_util::sync::CancellationToken;

/// Goosebin, a content-addressed paste server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to load in place of ./goosebin.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides bind.http_port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Key-value backend to store pastes in
    #[arg(long, value_enum, default_value_t = BackendKind::Redis)]
    backend: BackendKind,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) =
        GooseConfig::load_with_sources_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.bind.http_port = port;
    }
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let telemetry = telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

    for file in &sources.files {
        tracing::info!("Loaded config from {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        tracing::info!("Environment overrides: {}", sources.env_overrides.join(", "));
    }

    // --- Backend ---
    tracing::info!("📦 Initializing {:?} backend...", cli.backend);
    let engine = app::build_engine(&config, cli.backend)?;
    tracing::info!(
        ttl_secs = config.paste.ttl_secs,
        size_limit = config.paste.size_limit,
        "   Paste policy ready"
    );

    let shutdown_token = CancellationToken::new();

    match engine.check_backend(&shutdown_token.child_token()).await {
        Ok(()) => tracing::info!("   Backend reachable"),
        Err(e) => {
            tracing::warn!("   Backend not reachable yet: {}", e);
            tracing::warn!("   Continuing; requests will fail until it comes up");
        }
    }

    // --- HTTP ---
    let state = web::AppState::new(engine.clone(), shutdown_token.clone()).context("Failed to load page templates")?;
    let app_router = web::router(state);

    let bind_addr: SocketAddr = config
        .bind
        .address()
        .parse()
        .with_context(|| format!("Failed to parse bind address {}", config.bind.address()))?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("🪿 Goosebin starting on http://{}", bind_addr);
    tracing::info!("   Create: POST http://{}/create-paste", bind_addr);
    tracing::info!("   View:   GET  http://{}/paste/{{key}}", bind_addr);
    tracing::info!("   Health: GET  http://{}/health", bind_addr);

    let shutdown_token_srv = shutdown_token.clone();
    let server = axum::serve(listener, app_router).with_graceful_shutdown(async move {
        shutdown_token_srv.cancelled().await;
        tracing::info!("Server shutdown signal received");
    });

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("Server shutdown with error: {:?}", e);
        }
    });

    wait_for_signal().await;
    shutdown_token.cancel();

    if let Err(e) = server_task.await {
        tracing::error!("Server task failed: {:?}", e);
    }

    engine.shutdown().await;
    tracing::info!("Shutdown complete");

    telemetry.shutdown();

    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM (systemd, container runtimes).
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to setup SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["goosebin"]);
        assert_eq!(cli.backend, BackendKind::Redis);
        assert!(cli.config.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "goosebin",
            "--config",
            "/tmp/goosebin.toml",
            "--port",
            "9000",
            "--backend",
            "memory",
            "--print-config",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/goosebin.toml")));
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.backend, BackendKind::Memory);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["goosebin", "--backend", "etcd"]).is_err());
    }
}
