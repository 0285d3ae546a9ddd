use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use windowguard::config::WindowGuardConfig;
use windowguard::http::{AppState, HttpServer};
use windowguard::ratelimit::{spawn_housekeeping, FixedWindowLimiter};

/// Command line arguments. Values given here override the config file and
/// environment.
#[derive(Parser, Debug)]
#[command(name = "windowguard", version)]
#[command(about = "HTTP server protected by a fixed window rate limiter")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Requests allowed per window
    #[arg(long)]
    limit: Option<u64>,

    /// Window length in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Args {
    fn apply(&self, config: &mut WindowGuardConfig) {
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if let Some(limit) = self.limit {
            config.rate_limiting.limit = limit;
        }
        if let Some(window_ms) = self.window_ms {
            config.rate_limiting.window_size_ms = window_ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Windowguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = WindowGuardConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    info!(
        http_addr = %config.server.http_addr,
        limit = config.rate_limiting.limit,
        window_size_ms = config.rate_limiting.window_size_ms,
        "Configuration loaded"
    );

    // Initialize the rate limiter
    let quota = config.rate_limiting.quota()?;
    let rate_limiter = Arc::new(FixedWindowLimiter::new(quota.limit, quota.window_size_ms)?);
    info!("Rate limiter initialized");

    let (housekeeping_tx, housekeeping_rx) = watch::channel(false);
    let housekeeping = match config.rate_limiting.eviction_interval_secs {
        0 => None,
        secs => Some(spawn_housekeeping(
            rate_limiter.clone(),
            Duration::from_secs(secs),
            housekeeping_rx,
        )),
    };

    let state = AppState {
        rate_limiter: rate_limiter.clone(),
        greeting: config.server.greeting.clone(),
        trust_forwarded_for: config.server.trust_forwarded_for,
    };
    let server = HttpServer::new(config.server.http_addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    let served = server.serve_with_shutdown(shutdown_signal()).await;

    let _ = housekeeping_tx.send(true);
    if let Some(handle) = housekeeping {
        handle.await?;
    }

    served?;
    info!(tracked_keys = rate_limiter.len(), "Windowguard stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "windowguard",
            "--http-addr",
            "0.0.0.0:9000",
            "--limit",
            "50",
            "--window-ms",
            "1000",
            "--log-format",
            "json",
        ])
        .unwrap();

        let mut config = WindowGuardConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.rate_limiting.limit, 50);
        assert_eq!(config.rate_limiting.window_size_ms, 1000);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn test_cli_defaults_leave_config_alone() {
        let args = Args::try_parse_from(["windowguard"]).unwrap();

        let mut config = WindowGuardConfig::default();
        args.apply(&mut config);

        assert_eq!(config.rate_limiting.limit, 5);
        assert_eq!(args.log_format, LogFormat::Text);
        assert!(args.config.is_none());
    }
}
