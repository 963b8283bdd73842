//! Lookup Module
//!
//! This module turns a request key into a response. It receives parsed
//! requests from the connection layer, consults the cache and, on a miss,
//! the configured system of record.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Request parse  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ LookupHandler   │  (this module)
//! │                 │
//! │  - KeyParts     │
//! │  - Templates    │
//! │  - Cache-aside  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │   CachePool     │      │    Backend      │
//! └─────────────────┘      └─────────────────┘
//! ```

pub mod handler;
pub mod key;
pub mod template;

pub use handler::{LookupHandler, LookupStats, QueryTemplates, RenderedQueries};
pub use key::{KeyParts, NO_DOMAIN};
pub use template::{Escape, TemplateError, TemplateRenderer};
