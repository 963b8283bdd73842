//! Listener and Accept Loop
//!
//! The server owns the listening socket. Every accepted connection is
//! logged and handed to its own [`ConnectionHandler`] task; an accept error
//! is logged and the loop carries on. The loop only ends when the shutdown
//! future passed to [`Server::run_until`] completes. In-flight requests are
//! not drained.
//!
//! [`ConnectionHandler`]: crate::connection::ConnectionHandler

use crate::connection::{handle_connection, ConnectionStats};
use crate::lookup::LookupHandler;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info};

pub struct Server {
    listener: TcpListener,
    lookup: LookupHandler,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Binds the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs, lookup: LookupHandler) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, lookup))
    }

    /// Wraps an already bound listener.
    pub fn from_listener(listener: TcpListener, lookup: LookupHandler) -> Self {
        Self {
            listener,
            lookup,
            stats: Arc::new(ConnectionStats::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::select! {
            _ = self.accept_loop() => {}
            _ = shutdown => {
                info!("Shutdown signal received, stopping server...");
            }
        }
    }

    /// Main loop that accepts incoming connections
    async fn accept_loop(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!(client = %addr, "Accepted connection");
                    let lookup = self.lookup.clone();
                    let stats = Arc::clone(&self.stats);

                    // Spawn a task to handle this connection
                    tokio::spawn(handle_connection(stream, addr, lookup, stats));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
