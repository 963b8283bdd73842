//! Request Parsing
//!
//! A request is one line of text from the MTA:
//!
//! ```text
//! get alice@example.com\n
//! ```
//!
//! The line is split on ASCII whitespace. The first token is the command and
//! the second is the key; anything after that is ignored. Missing tokens
//! become empty strings, so a bare `get\n` yields an empty key rather than
//! an error. The command is recorded for logging only.

use std::fmt;

/// The command Postfix sends for a table lookup.
pub const LOOKUP_COMMAND: &str = "get";

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    /// The command token (observational only)
    pub command: String,
    /// The lookup key, empty when the line had a single token
    pub key: String,
}

impl Request {
    /// Creates a request from its parts.
    pub fn new(command: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            key: key.into(),
        }
    }

    /// Parses a request from the bytes of one socket read.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the key is only ever
    /// rendered into text queries.
    pub fn parse(buf: &[u8]) -> Self {
        let text = String::from_utf8_lossy(buf);
        let mut tokens = text.split_ascii_whitespace();

        let command = tokens.next().unwrap_or_default();
        let key = tokens.next().unwrap_or_default();

        Self::new(command, key)
    }

    /// Returns true if the command is the standard lookup verb.
    pub fn is_lookup(&self) -> bool {
        self.command.eq_ignore_ascii_case(LOOKUP_COMMAND)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.command, self.key)
    }
}
