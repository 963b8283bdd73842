//! LDAP Backend
//!
//! The rendered template is used as a subtree search filter under the
//! configured base. Only the configured result attribute is requested, and
//! only the first value of the first entry is returned. The search carries a
//! server-side time limit and the same bound on the client side.

use super::{Backend, BackendError, BackendKind, BackendResult};
use crate::config::LdapConfig;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use std::time::Duration;
use tracing::debug;

const KIND: BackendKind = BackendKind::Ldap;

pub struct LdapBackend {
    ldap: Ldap,
    base: String,
    attribute: String,
    timeout: Duration,
}

impl LdapBackend {
    /// Connects and binds with the configured credentials.
    ///
    /// An empty `bind_dn` skips the bind and searches anonymously.
    pub async fn connect(config: &LdapConfig) -> Result<Self, BackendError> {
        let timeout = config.timeout();
        let settings = LdapConnSettings::new().set_conn_timeout(timeout);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.uri)
            .await
            .map_err(|err| BackendError::connect(KIND, err))?;
        ldap3::drive!(conn);

        if !config.bind_dn.is_empty() {
            ldap.simple_bind(&config.bind_dn, &config.bind_password)
                .await
                .and_then(|res| res.success())
                .map_err(|err| BackendError::connect(KIND, err))?;
        }

        debug!(uri = %config.uri, base = %config.base, "LDAP session established");

        Ok(Self {
            ldap,
            base: config.base.clone(),
            attribute: config.result_attribute.clone(),
            timeout,
        })
    }
}

/// Returns the first value of `attribute`, matching the name case-insensitively.
fn first_value(entry: SearchEntry, attribute: &str) -> Option<String> {
    entry
        .attrs
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
        .and_then(|(_, values)| values.into_iter().next())
}

#[async_trait]
impl Backend for LdapBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn query(&self, filter: &str) -> BackendResult {
        let mut ldap = self.ldap.clone();
        let time_limit = i32::try_from(self.timeout.as_secs()).unwrap_or(i32::MAX);

        let result = ldap
            .with_search_options(SearchOptions::new().timelimit(time_limit))
            .with_timeout(self.timeout)
            .search(
                &self.base,
                Scope::Subtree,
                filter,
                vec![self.attribute.as_str()],
            )
            .await
            .and_then(|res| res.success());

        let entries = match result {
            Ok((entries, _)) => entries,
            Err(err) => return BackendResult::Failure(BackendError::query(KIND, err)),
        };

        let value = entries
            .into_iter()
            .next()
            .and_then(|entry| first_value(SearchEntry::construct(entry), &self.attribute));

        BackendResult::from_value(KIND, value)
    }
}
