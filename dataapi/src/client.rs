use crate::audit::{AuditSink, TracingAuditSink};
use crate::cache::{MokaResponseCache, ResponseCache};
use crate::errors::{DataApiError, Result};
use crate::settings::ApiSettings;
use std::sync::Arc;

struct ApiClientInner {
    http: reqwest::Client,
    settings: Arc<ApiSettings>,
    cache: Arc<dyn ResponseCache>,
    audit: Arc<dyn AuditSink>,
}

/// Everything an API needs to send requests: the HTTP client, platform
/// settings, the response cache and the audit sink.
///
/// Cheap to clone; all APIs built from one client share its connection pool
/// and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let cache = Arc::new(MokaResponseCache::new(settings.cache_capacity));
        Self::with_parts(settings, cache, Arc::new(TracingAuditSink))
    }

    pub fn with_parts(
        settings: ApiSettings,
        cache: Arc<dyn ResponseCache>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!settings.verify_certificates)
            .build()
            .map_err(|e| DataApiError::Client(e.to_string()))?;

        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                http,
                settings: Arc::new(settings),
                cache,
                audit,
            }),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn settings(&self) -> &Arc<ApiSettings> {
        &self.inner.settings
    }

    pub fn cache(&self) -> &dyn ResponseCache {
        self.inner.cache.as_ref()
    }

    pub fn audit(&self) -> &dyn AuditSink {
        self.inner.audit.as_ref()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("app_code", &self.inner.settings.app_code)
            .finish_non_exhaustive()
    }
}
