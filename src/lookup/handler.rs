//! Lookup Handler
//!
//! Turns one parsed request into one response, reading through the cache:
//!
//! ```text
//!   Request { command, key }
//!        │
//!        ▼
//!   KeyParts::parse ──► render mysql / ldap / postgres templates
//!        │
//!        ▼
//!   CachePool::get(key) ── hit ──────────────────────► Response::Cached(line)
//!        │ miss (or cache error)
//!        ▼
//!   backend? ── none ────────────────────────────────► Response::Unknown
//!        │
//!        ▼
//!   ensure_healthy + query(rendered) ── NotFound ────► Response::Unknown
//!        │                           └─ Failure ─────► Response::Unknown
//!        │ Found(value)
//!        ▼
//!   CachePool::set(key, "<OK> value\n") ─────────────► Response::Found(value)
//! ```
//!
//! The handler holds every shared handle it needs (cache pool, backend,
//! templates) so it can be built with fakes in tests. Cloning is cheap.

use super::key::KeyParts;
use super::template::{TemplateError, TemplateRenderer};
use crate::backend::{Backend, BackendKind, BackendResult};
use crate::cache::CachePool;
use crate::config::Config;
use crate::protocol::{Request, Response, ResponseFormat};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The query or filter template configured for each backend kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplates {
    pub mysql: String,
    pub ldap: String,
    pub postgres: String,
}

impl QueryTemplates {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mysql: config.template(BackendKind::Mysql).to_string(),
            ldap: config.template(BackendKind::Ldap).to_string(),
            postgres: config.template(BackendKind::Postgres).to_string(),
        }
    }

    /// Renders all three templates for one key, each with its backend's
    /// escaping.
    pub fn render(&self, renderer: &TemplateRenderer, parts: &KeyParts<'_>) -> RenderedQueries {
        let render = |template: &str, kind: BackendKind| renderer.render(template, parts, kind.escape());
        RenderedQueries {
            mysql: render(&self.mysql, BackendKind::Mysql),
            ldap: render(&self.ldap, BackendKind::Ldap),
            postgres: render(&self.postgres, BackendKind::Postgres),
        }
    }
}

/// The three templates rendered for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQueries {
    pub mysql: Result<String, TemplateError>,
    pub ldap: Result<String, TemplateError>,
    pub postgres: Result<String, TemplateError>,
}

impl RenderedQueries {
    pub fn get(&self, kind: BackendKind) -> Result<&str, &TemplateError> {
        let rendered = match kind {
            BackendKind::Mysql => &self.mysql,
            BackendKind::Ldap => &self.ldap,
            BackendKind::Postgres => &self.postgres,
        };
        rendered.as_deref()
    }

    /// The templates that failed to render, in priority order.
    pub fn errors(&self) -> impl Iterator<Item = (BackendKind, &TemplateError)> + '_ {
        BackendKind::PRIORITY
            .into_iter()
            .filter_map(move |kind| self.get(kind).err().map(|e| (kind, e)))
    }
}

/// Counters for lookup outcomes.
#[derive(Debug, Default)]
pub struct LookupStats {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_errors: AtomicU64,
    pub backend_found: AtomicU64,
    pub backend_not_found: AtomicU64,
    pub backend_failures: AtomicU64,
}

impl LookupStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Executes lookups against the cache and the selected backend.
#[derive(Clone)]
pub struct LookupHandler {
    cache: Arc<CachePool>,
    backend: Option<Arc<dyn Backend>>,
    templates: Arc<QueryTemplates>,
    renderer: TemplateRenderer,
    format: Arc<ResponseFormat>,
    stats: Arc<LookupStats>,
}

impl LookupHandler {
    /// Creates a handler from its collaborators.
    ///
    /// `backend` is `None` when no backend is enabled; every cache miss is
    /// then answered with the failure response.
    pub fn new(
        cache: Arc<CachePool>,
        backend: Option<Arc<dyn Backend>>,
        templates: QueryTemplates,
        renderer: TemplateRenderer,
        format: ResponseFormat,
    ) -> Self {
        Self {
            cache,
            backend,
            templates: Arc::new(templates),
            renderer,
            format: Arc::new(format),
            stats: Arc::new(LookupStats::new()),
        }
    }

    /// Creates a handler with templates, limits and tokens taken from `config`.
    pub fn from_config(
        config: &Config,
        cache: Arc<CachePool>,
        backend: Option<Arc<dyn Backend>>,
    ) -> Self {
        Self::new(
            cache,
            backend,
            QueryTemplates::from_config(config),
            TemplateRenderer::new(config.protocol.max_query_length),
            config.protocol.response_format(),
        )
    }

    /// The tokens used to serialize responses.
    pub fn format(&self) -> &ResponseFormat {
        &self.format
    }

    pub fn stats(&self) -> &LookupStats {
        &self.stats
    }

    /// Executes one request and returns the response to send.
    pub async fn execute(&self, request: &Request) -> Response {
        let key = request.key.as_str();
        let parts = KeyParts::parse(key);
        info!(
            command = %request.command,
            lookup = request.is_lookup(),
            key = %key,
            "Lookup request"
        );

        let rendered = self.templates.render(&self.renderer, &parts);
        let selected = self.backend.as_ref().map(|backend| backend.kind());
        for (kind, e) in rendered.errors() {
            // The selected backend's overflow is reported below, before it fails the request
            if Some(kind) != selected {
                warn!(key = %key, backend = %kind, error = %e, "Cannot render query");
            }
        }

        match self.cache.get(key).await {
            Ok(Some(line)) => {
                LookupStats::incr(&self.stats.cache_hits);
                debug!(key = %key, "Cache hit");
                return Response::Cached(line);
            }
            Ok(None) => {
                LookupStats::incr(&self.stats.cache_misses);
                info!(key = %key, "Missing key, checking datasource");
            }
            Err(e) => {
                LookupStats::incr(&self.stats.cache_errors);
                warn!(key = %key, error = %e, "Cache lookup failed, checking datasource");
            }
        }

        let Some(backend) = &self.backend else {
            info!(key = %key, "Key not found, no backend enabled");
            return Response::Unknown;
        };
        let kind = backend.kind();

        let query = match rendered.get(kind) {
            Ok(query) => query,
            Err(e) => {
                error!(key = %key, backend = %kind, error = %e, "Cannot render query");
                return Response::Unknown;
            }
        };

        if let Err(e) = backend.ensure_healthy().await {
            LookupStats::incr(&self.stats.backend_failures);
            warn!(key = %key, backend = %kind, error = %e, "Backend unavailable");
            return Response::Unknown;
        }

        match backend.query(query).await {
            BackendResult::Found(value) => {
                LookupStats::incr(&self.stats.backend_found);
                let line = self.format.success_line(&value);
                if let Err(e) = self.cache.set(key, &line).await {
                    warn!(key = %key, error = %e, "Failed to store key in cache");
                }
                info!(key = %key, backend = %kind, "Key found");
                Response::Found(value)
            }
            BackendResult::NotFound => {
                LookupStats::incr(&self.stats.backend_not_found);
                info!(key = %key, backend = %kind, "Key not found");
                Response::Unknown
            }
            BackendResult::Failure(e) => {
                LookupStats::incr(&self.stats.backend_failures);
                warn!(key = %key, backend = %kind, error = %e, "Backend query failed");
                Response::Unknown
            }
        }
    }
}
