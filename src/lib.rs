//! # tcpmap - A Postfix tcp_table Lookup Daemon
//!
//! tcpmap answers Postfix `tcp:` table lookups. Every key is looked up in a
//! Redis cache first; on a miss it is looked up in one system of record
//! (MySQL, LDAP or PostgreSQL), the answer is stored in the cache, and the
//! client gets its reply.
//!
//! ## Features
//!
//! - **Postfix-Compatible**: Speaks the tcp_table protocol (`get key` / `200 value`)
//! - **Read-Through Cache**: Redis in front of the backend, pooled connections
//! - **Templated Queries**: `%u`, `%d` and `%s` expand to the parts of the key
//! - **Async I/O**: Built on a single-threaded Tokio runtime
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              tcpmap                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│   Lookup    │                  │
//! │  │ (Listener)  │    │  Handler    │    │   Handler   │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                          ┌────────────────────┼───────────────┐         │
//! │                          ▼                    ▼               ▼         │
//! │                   ┌─────────────┐     ┌─────────────┐  ┌────────────┐   │
//! │                   │  KeyParts + │     │  CachePool  │  │  Backend   │   │
//! │                   │  Templates  │     │  (Redis)    │  │ MySQL/LDAP │   │
//! │                   └─────────────┘     └─────────────┘  │ /Postgres  │   │
//! │                                                        └────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tcpmap::backend::BackendSelector;
//! use tcpmap::cache::CachePool;
//! use tcpmap::config::Config;
//! use tcpmap::lookup::LookupHandler;
//! use tcpmap::server::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/tcpmap.toml")?;
//!     let backend = BackendSelector::connect(&config).await?;
//!     let cache = Arc::new(CachePool::connect(&config.cache).await?);
//!     let lookup = LookupHandler::from_config(&config, cache, backend);
//!
//!     let server = Server::bind(config.bind_address(), lookup).await?;
//!     server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request parsing and response lines
//! - [`lookup`]: Key splitting, template rendering and the cache-aside handler
//! - [`backend`]: The systems of record and the startup selection between them
//! - [`cache`]: The fixed-size cache connection pool
//! - [`connection`]: Client connection management
//! - [`server`]: Listener and accept loop
//! - [`config`]: TOML configuration

pub mod backend;
pub mod cache;
pub mod config;
pub mod connection;
pub mod lookup;
pub mod protocol;
pub mod server;

// Re-export commonly used types for convenience
pub use backend::{Backend, BackendKind, BackendResult, BackendSelector};
pub use cache::CachePool;
pub use config::{Config, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::{handle_connection, ConnectionStats};
pub use lookup::{KeyParts, LookupHandler, TemplateRenderer};
pub use protocol::{Request, Response, ResponseFormat};
pub use server::Server;

/// Version of tcpmap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
