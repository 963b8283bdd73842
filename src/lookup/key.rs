//! Lookup Key Parsing
//!
//! Postfix asks for addresses like `user@example.com`, but it also asks for
//! bare domains and local names depending on the table type. The key is
//! split into the parts the query templates can reference:
//!
//! ```text
//!   "alice@example.com"   ->  local = "alice"          domain = "example.com"
//!   "bob"                 ->  local = "bob"            domain = NULL
//!   "a@b@c"               ->  local = "a@b@c"          domain = NULL
//!   ""                    ->  local = ""               domain = NULL
//! ```
//!
//! Only a key with exactly one `@` has a domain. Everything else keeps the
//! whole key as its local part and uses the [`NO_DOMAIN`] sentinel.

use std::fmt;

/// Text substituted for `%d` when the key has no domain part.
pub const NO_DOMAIN: &str = "NULL";

/// The semantic parts of a lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts<'a> {
    /// The full key as received
    pub full: &'a str,
    /// Everything before the `@`, or the full key when there is no single `@`
    pub local: &'a str,
    /// Everything after the `@`, `None` when there is no single `@`
    pub domain: Option<&'a str>,
}

impl<'a> KeyParts<'a> {
    /// Splits a raw key into its parts.
    pub fn parse(key: &'a str) -> Self {
        let mut split = key.splitn(3, '@');
        let first = split.next().unwrap_or_default();

        match (split.next(), split.next()) {
            (Some(domain), None) => Self {
                full: key,
                local: first,
                domain: Some(domain),
            },
            _ => Self {
                full: key,
                local: key,
                domain: None,
            },
        }
    }

    /// The domain part, or the [`NO_DOMAIN`] sentinel.
    pub fn domain_or_sentinel(&self) -> &'a str {
        self.domain.unwrap_or(NO_DOMAIN)
    }

    /// Returns true if the key carried exactly one `@`.
    pub fn has_domain(&self) -> bool {
        self.domain.is_some()
    }
}

impl fmt::Display for KeyParts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} / {})", self.full, self.local, self.domain_or_sentinel())
    }
}
