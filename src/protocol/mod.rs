//! tcp_table Protocol Implementation
//!
//! This module implements the line-oriented protocol Postfix uses to talk
//! to a `tcp:` lookup table.
//!
//! ## Overview
//!
//! Each request is a single line holding a command and a key. Each reply is
//! a single line holding a status token and either the value or a fixed
//! error message.
//!
//! ```text
//! client:  get alice@example.com\n
//! server:  200 mailbox:alice\n
//!
//! client:  get nobody@example.com\n
//! server:  500 unknown entry\n
//! ```
//!
//! ## Modules
//!
//! - `request`: Splits an incoming line into `Request { command, key }`
//! - `response`: Builds success and failure lines

pub mod request;
pub mod response;

// Re-export commonly used types for convenience
pub use request::{Request, LOOKUP_COMMAND};
pub use response::{Response, ResponseFormat};
