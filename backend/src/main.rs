//! Commerce MCP gateway server.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use commerce_mcp::{
    auth::{IdentityVerifier, JwtVerifier},
    config::Config,
    create_app_with_config,
    forwarder::RestForwarder,
    mcp::commerce_registry,
    state::AppState,
};

/// Commerce MCP gateway - exposes the commerce REST API as MCP tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "COMMERCE_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the commerce REST API
    #[arg(long)]
    backend_url: Option<String>,
}

/// Initialize logging. The returned guard flushes the log file on drop.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    // Config level > RUST_LOG > info
    let filter = || match &config.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let timer = fmt::time::UtcTime::new(time::format_description::well_known::Rfc3339);

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_timer(timer.clone())
        .compact()
        .with_filter(filter());

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::from_figment(args.config, args.port, args.backend_url)?;
    let _log_guard = init_logging(&config)?;

    info!("Starting commerce MCP gateway...");
    if let Some(ref path) = config.log_file {
        info!("Logging to {}", path.display());
    }
    let registry = commerce_registry()?;
    let forwarder = RestForwarder::new(config.backend_url.clone(), config.backend_timeout)?;
    info!("Forwarding tool calls to {}", forwarder.base_url());
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&config.jwt));

    let state = AppState::with_options(
        registry,
        Arc::new(forwarder),
        config.session.clone(),
        config.enforce_call_roles,
        config.public_url.clone(),
    );

    let app = create_app_with_config(state.clone(), verifier, config.cors_allowed_origins.clone());

    // Bind to 0.0.0.0 to be accessible from all interfaces (Docker, network, etc.)
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Set up graceful shutdown handler
    let sessions = state.sessions().clone();
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down gracefully...");

        // Open streams never finish on their own, so close them before draining.
        sessions.close_all();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down");
    Ok(())
}
