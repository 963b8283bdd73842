//! Response Formatting
//!
//! Postfix's tcp_table client understands a three-digit status, a space,
//! and a payload on a single line:
//!
//! ```text
//! 200 mailbox:alice\n       <- lookup succeeded, payload is the value
//! 500 unknown entry\n       <- key not found (permanent)
//! ```
//!
//! The status tokens and the failure message are configurable; the defaults
//! match the Postfix convention.

use std::fmt;

/// Status token for a successful lookup
pub const DEFAULT_STATUS_OK: &str = "200";

/// Status token for a failed lookup
pub const DEFAULT_STATUS_ERROR: &str = "500";

/// Fixed message sent with the failure status
pub const DEFAULT_ERROR_MESSAGE: &str = "unknown entry";

/// Line terminator for every response
pub const NEWLINE: &str = "\n";

/// The literal tokens used to build response lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFormat {
    pub status_ok: String,
    pub status_error: String,
    pub error_message: String,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self {
            status_ok: DEFAULT_STATUS_OK.to_string(),
            status_error: DEFAULT_STATUS_ERROR.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

impl ResponseFormat {
    /// `<STATUS_OK> <value>\n`
    pub fn success_line(&self, value: &str) -> String {
        format!("{} {}{}", self.status_ok, value, NEWLINE)
    }

    /// `<STATUS_ERROR> unknown entry\n`
    pub fn failure_line(&self) -> String {
        format!("{} {}{}", self.status_error, self.error_message, NEWLINE)
    }
}

/// The outcome of one request, as it will be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A complete line read back from the cache, written as-is
    Cached(String),
    /// A value returned by a backend
    Found(String),
    /// Not found, backend failure, or no backend configured
    Unknown,
}

impl Response {
    /// Returns the wire representation of this response.
    pub fn serialize(&self, format: &ResponseFormat) -> Vec<u8> {
        match self {
            Response::Cached(line) => line.clone().into_bytes(),
            Response::Found(value) => format.success_line(value).into_bytes(),
            Response::Unknown => format.failure_line().into_bytes(),
        }
    }

    /// Returns true for either kind of successful lookup.
    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Unknown)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Cached(line) => write!(f, "(cached) {}", line.trim_end()),
            Response::Found(value) => write!(f, "(found) {}", value),
            Response::Unknown => write!(f, "(unknown)"),
        }
    }
}
