//! tcpmap - Postfix tcp_table lookup daemon
//!
//! This is the main entry point for the tcpmap server.
//! It loads the configuration, optionally detaches into the background,
//! connects the cache pool and the selected backend, and serves lookups
//! until a termination signal arrives.
//!
//! With `-d` the process forks before the runtime is built. The child keeps
//! running with `/` as its working directory and stdio on `/dev/null`, so
//! the configuration is read (and any error reported) before detaching.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tcpmap::backend::BackendSelector;
use tcpmap::cache::CachePool;
use tcpmap::config::Config;
use tcpmap::lookup::LookupHandler;
use tcpmap::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Postfix tcp_table daemon with a Redis read-through cache
#[derive(Debug, Parser)]
#[command(name = "tcpmap", version = tcpmap::VERSION)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the listen address, e.g. 0.0.0.0:10028
    #[arg(short, long, value_name = "ADDR:PORT")]
    listen: Option<String>,

    /// Detach from the terminal and run in the background
    #[arg(short, long)]
    daemon: bool,
}

#[cfg(unix)]
fn daemonize() -> anyhow::Result<()> {
    daemonize::Daemonize::new()
        .working_directory("/")
        .start()
        .context("could not daemonize")
}

#[cfg(not(unix))]
fn daemonize() -> anyhow::Result<()> {
    anyhow::bail!("daemon mode is only supported on unix")
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Completes on SIGINT, SIGTERM or SIGHUP.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to install SIGHUP handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
            _ = hup.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("could not load {}", path.display()))?,
        None => Config::default(),
    };

    // Fork before any runtime threads or sockets exist
    if cli.daemon {
        daemonize()?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start runtime")?;
    runtime.block_on(serve(cli, config))
}

async fn serve(cli: Cli, config: Config) -> anyhow::Result<()> {
    init_logging(&config);

    let bind_address = cli.listen.unwrap_or_else(|| config.bind_address());

    // Pick and connect the system of record
    let backend = BackendSelector::connect(&config)
        .await
        .context("could not connect backend")?;
    match &backend {
        Some(backend) => info!(backend = %backend.kind(), "Backend connected"),
        None => info!("No backend enabled, cache misses will be answered as unknown"),
    }

    // Open every cache connection up front
    let cache = CachePool::connect(&config.cache)
        .await
        .context("could not init cache pool")?;

    let lookup = LookupHandler::from_config(&config, Arc::new(cache), backend);

    let server = Server::bind(&bind_address, lookup)
        .await
        .with_context(|| format!("error binding socket {bind_address}"))?;
    info!("tcpmap v{} listening on {}", tcpmap::VERSION, bind_address);

    server.run_until(shutdown_signal()).await;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_daemon_flag() {
        let cli = Cli::try_parse_from(["tcpmap", "-d", "-c", "/etc/tcpmap.toml"]).unwrap();
        assert!(cli.daemon);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tcpmap.toml")));

        let cli = Cli::try_parse_from(["tcpmap", "--listen", "0.0.0.0:10028"]).unwrap();
        assert!(!cli.daemon);
        assert_eq!(cli.listen.as_deref(), Some("0.0.0.0:10028"));
    }
}
