//! Tandem server binary.
//!
//! # Usage
//!
//! ```bash
//! # Development: loopback on port 8888
//! tandem-server
//!
//! # Production: all interfaces, port from the environment
//! PORT=9000 tandem-server --mode production
//! ```

use std::net::SocketAddr;

use clap::Parser;
use tandem_server::{DEFAULT_PORT, DriverConfig, RuntimeMode, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tandem signaling relay
#[derive(Parser, Debug)]
#[command(name = "tandem-server")]
#[command(about = "Room-based WebRTC signaling relay")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Deployment mode (production binds all interfaces)
    #[arg(short, long, env = "TANDEM_MODE", value_enum, default_value_t = RuntimeMode::Development)]
    mode: RuntimeMode,

    /// Explicit bind address, overrides --mode and --port
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Tandem server starting in {:?} mode", args.mode);

    let mut config = ServerRuntimeConfig::for_mode(args.mode, args.port);
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.driver = DriverConfig { max_connections: args.max_connections };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run_until(shutdown_signal()).await?;

    tracing::info!("Server stopped");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed, that signal is never observed and the
/// other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
