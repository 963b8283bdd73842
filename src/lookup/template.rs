//! Query Template Rendering
//!
//! Each backend is configured with a query (SQL) or search filter (LDAP)
//! containing placeholders that are filled from the lookup key:
//!
//! | Placeholder | Replaced with                         |
//! |-------------|---------------------------------------|
//! | `%u`        | local part (before the `@`)           |
//! | `%d`        | domain part, or `NULL` without one    |
//! | `%s`        | the full key                          |
//!
//! Rendering is a single left-to-right pass. A `%` that is not followed by
//! one of the three letters is copied as-is and scanning resumes at the next
//! character, so `%%u` renders as `%` followed by the local part.
//!
//! Substituted values are escaped for the query language of the target
//! backend (see [`Escape`]); template text is copied untouched. A key is
//! chosen by whoever sends the mail, so it must never be able to change the
//! shape of the query it is placed in.
//!
//! The rendered string is bounded. Output that would exceed the bound is an
//! error; it is never truncated into a different query.

use super::key::KeyParts;
use std::borrow::Cow;
use thiserror::Error;

/// Default upper bound for a rendered query, in bytes.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 512;

/// Errors produced while rendering a template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The rendered query is longer than the configured bound
    #[error("rendered query too long: {length} bytes (max: {max})")]
    TooLong { length: usize, max: usize },
}

/// Quoting applied to each substituted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Insert values as they are
    Verbatim,
    /// RFC 4515 filter value escaping
    LdapFilter,
    /// MySQL string literal: `'` doubled, `\` and NUL backslash-escaped
    MysqlString,
    /// Standard-conforming PostgreSQL string literal: `'` doubled
    PostgresString,
}

impl Escape {
    /// Escapes one value.
    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            Escape::Verbatim => Cow::Borrowed(value),
            Escape::LdapFilter => ldap3::ldap_escape(value),
            Escape::MysqlString => {
                if !value.contains(['\'', '\\', '\0']) {
                    return Cow::Borrowed(value);
                }
                let mut out = String::with_capacity(value.len() + 8);
                for c in value.chars() {
                    match c {
                        '\'' => out.push_str("''"),
                        '\\' => out.push_str("\\\\"),
                        '\0' => out.push_str("\\0"),
                        c => out.push(c),
                    }
                }
                Cow::Owned(out)
            }
            Escape::PostgresString => {
                if value.contains('\'') {
                    Cow::Owned(value.replace('\'', "''"))
                } else {
                    Cow::Borrowed(value)
                }
            }
        }
    }
}

/// Renders query templates against parsed keys.
#[derive(Debug, Clone, Copy)]
pub struct TemplateRenderer {
    max_length: usize,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUERY_LENGTH)
    }
}

impl TemplateRenderer {
    /// Creates a renderer that rejects output longer than `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Expands `%u`, `%d` and `%s` in `template`, escaping each value.
    pub fn render(
        &self,
        template: &str,
        parts: &KeyParts<'_>,
        escape: Escape,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len() + parts.full.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }

            let replacement = match chars.peek() {
                Some('u') => Some(parts.local),
                Some('d') => Some(parts.domain_or_sentinel()),
                Some('s') => Some(parts.full),
                _ => None,
            };

            match replacement {
                Some(value) => {
                    chars.next();
                    out.push_str(&escape.apply(value));
                }
                None => out.push('%'),
            }
        }

        if out.len() > self.max_length {
            return Err(TemplateError::TooLong {
                length: out.len(),
                max: self.max_length,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, key: &str) -> Result<String, TemplateError> {
        TemplateRenderer::default().render(template, &KeyParts::parse(key), Escape::Verbatim)
    }

    #[test]
    fn test_all_placeholders() {
        let out = render(
            "SELECT v FROM t WHERE u='%u' AND d='%d' AND k='%s'",
            "alice@example.com",
        )
        .unwrap();
        assert_eq!(
            out,
            "SELECT v FROM t WHERE u='alice' AND d='example.com' AND k='alice@example.com'"
        );
    }

    #[test]
    fn test_ldap_filter() {
        let out = render("(&(uid=%u)(mailDomain=%d))", "bob@example.org").unwrap();
        assert_eq!(out, "(&(uid=bob)(mailDomain=example.org))");
    }

    #[test]
    fn test_missing_domain_renders_sentinel() {
        let out = render("domain=%d user=%u", "bob").unwrap();
        assert_eq!(out, "domain=NULL user=bob");
    }

    #[test]
    fn test_empty_key_flows_through() {
        let out = render("k='%s' d='%d'", "").unwrap();
        assert_eq!(out, "k='' d='NULL'");
    }

    #[test]
    fn test_unknown_sequences_pass_through() {
        assert_eq!(render("LIKE '%x%'", "a@b").unwrap(), "LIKE '%x%'");
        assert_eq!(render("100%", "a@b").unwrap(), "100%");
        assert_eq!(render("%", "a@b").unwrap(), "%");
    }

    #[test]
    fn test_percent_before_placeholder() {
        // The first `%` is literal, the second starts a placeholder
        assert_eq!(render("%%u", "alice@example.com").unwrap(), "%alice");
        assert_eq!(render("LIKE '%%d'", "a@example.com").unwrap(), "LIKE '%example.com'");
    }

    #[test]
    fn test_no_placeholders_left() {
        let templates = ["%u%d%s", "x%uy%dz%s", "%%%u%%%d", "%q%u%"];
        for template in templates {
            let out = render(template, "alice@example.com").unwrap();
            assert!(!out.contains("%u"), "{template} -> {out}");
            assert!(!out.contains("%d"), "{template} -> {out}");
            assert!(!out.contains("%s"), "{template} -> {out}");
        }
    }

    #[test]
    fn test_literals_kept_in_order() {
        let template = "SELECT x FROM y WHERE a = '%u' -- ünïcode %d";
        let out = render(template, "alice@example.com").unwrap();

        let literals: String = template.replace("%u", "").replace("%d", "");
        let mut remaining = out.chars();
        for c in literals.chars() {
            assert!(remaining.any(|o| o == c), "literal {c:?} missing from {out}");
        }
    }

    #[test]
    fn test_too_long_is_rejected() {
        let renderer = TemplateRenderer::new(16);
        let err = renderer
            .render("key=%s", &KeyParts::parse("someone@example.com"), Escape::Verbatim)
            .unwrap_err();
        assert_eq!(err, TemplateError::TooLong { length: 23, max: 16 });
    }

    #[test]
    fn test_exact_bound_is_accepted() {
        let renderer = TemplateRenderer::new(5);
        let out = renderer
            .render("k=%u", &KeyParts::parse("abc"), Escape::Verbatim)
            .unwrap();
        assert_eq!(out, "k=abc");
    }

    fn render_escaped(template: &str, key: &str, escape: Escape) -> String {
        TemplateRenderer::default()
            .render(template, &KeyParts::parse(key), escape)
            .unwrap()
    }

    #[test]
    fn test_mysql_quotes_cannot_close_literal() {
        let out = render_escaped("SELECT v FROM map WHERE k='%s'", "'OR''='", Escape::MysqlString);
        assert_eq!(out, "SELECT v FROM map WHERE k='''OR''''='''");
    }

    #[test]
    fn test_mysql_backslash_escaped() {
        let out = render_escaped("k='%u' d='%d'", "a\\'b@ex\\ample.com", Escape::MysqlString);
        assert_eq!(out, "k='a\\\\''b' d='ex\\\\ample.com'");
    }

    #[test]
    fn test_postgres_quotes_doubled() {
        let out = render_escaped("WHERE u='%u' AND d='%d'", "o'brien@example.com", Escape::PostgresString);
        assert_eq!(out, "WHERE u='o''brien' AND d='example.com'");

        // Standard-conforming strings keep backslashes literal
        let out = render_escaped("k='%s'", "a\\b", Escape::PostgresString);
        assert_eq!(out, "k='a\\b'");
    }

    #[test]
    fn test_ldap_filter_metacharacters() {
        let out = render_escaped("(mail=%s)", "*)(uid=*@example.com", Escape::LdapFilter);
        assert_eq!(out, "(mail=\\2a\\29\\28uid=\\2a@example.com)");

        let out = render_escaped("(&(uid=%u)(domain=%d))", "a\\b@example.com", Escape::LdapFilter);
        assert_eq!(out, "(&(uid=a\\5cb)(domain=example.com))");
    }

    #[test]
    fn test_template_text_is_not_escaped() {
        // Quotes and parentheses in the template itself stay as written
        let out = render_escaped("(&(objectClass=*)(mail=%s))", "alice@example.com", Escape::LdapFilter);
        assert_eq!(out, "(&(objectClass=*)(mail=alice@example.com))");

        let out = render_escaped("SELECT '%' || v FROM t WHERE k='%d'", "bob", Escape::MysqlString);
        assert_eq!(out, "SELECT '%' || v FROM t WHERE k='NULL'");
    }

    #[test]
    fn test_bound_counts_escaped_length() {
        let renderer = TemplateRenderer::new(6);
        // "k=" + "a''b" is 6 bytes; one more quote is over
        assert!(renderer
            .render("k=%s", &KeyParts::parse("a'b"), Escape::MysqlString)
            .is_ok());
        assert_eq!(
            renderer
                .render("k=%s", &KeyParts::parse("a''b"), Escape::MysqlString)
                .unwrap_err(),
            TemplateError::TooLong { length: 8, max: 6 }
        );
    }
}
