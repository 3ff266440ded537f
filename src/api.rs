//! Outgoing API call attribution.
//!
//! Every request to the storefront backend is attributed to exactly one
//! tenant: the one current when the request is built. The HTTP transport
//! itself lives elsewhere; this module only produces the URL and tenant
//! headers, plus the guard used to drop the response if the session has
//! moved on to another tenant by the time it arrives.

use serde::Serialize;

use crate::edge::tenant_headers;
use crate::state::{FetchGuard, TenantContext};
use crate::{TenantError, TenantId};

/// A request stamped with the tenant it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantRequest {
    pub url: String,
    pub tenant: TenantId,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    guard: FetchGuard,
}

impl TenantRequest {
    pub fn guard(&self) -> &FetchGuard {
        &self.guard
    }

    /// Hand back `response` only if the session is still on this tenant.
    pub fn accept<T>(&self, context: &TenantContext, response: T) -> Option<T> {
        self.guard.accept(context, response)
    }
}

/// Stamps requests with the context's current tenant.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    context: TenantContext,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, context: TenantContext) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            context,
        }
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Build a request for `endpoint` (e.g. `/api/v1/config`).
    ///
    /// Fails with [`TenantError::Unresolved`] when no tenant is current.
    pub fn request(&self, endpoint: &str) -> Result<TenantRequest, TenantError> {
        let guard = self.context.guard().ok_or(TenantError::Unresolved)?;
        let tenant = guard.tenant().clone();
        let endpoint = endpoint.trim_start_matches('/');

        Ok(TenantRequest {
            url: format!("{}/{}", self.base_url, endpoint),
            headers: tenant_headers(&tenant)
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            tenant,
            guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TENANT_HEADER, TENANT_SCHEMA_HEADER};

    #[test]
    fn unresolved_session_cannot_call_out() {
        let client = ApiClient::new("http://api", TenantContext::in_memory());
        assert!(matches!(client.request("/api/v1/config"), Err(TenantError::Unresolved)));
    }

    #[test]
    fn request_carries_both_headers() {
        let ctx = TenantContext::in_memory();
        ctx.set_tenant(TenantId::parse("acme").unwrap());
        let client = ApiClient::new("http://api/", ctx);

        let req = client.request("/api/v1/products/all").unwrap();
        assert_eq!(req.url, "http://api/api/v1/products/all");
        assert_eq!(req.tenant.as_str(), "acme");
        assert_eq!(
            req.headers,
            vec![
                (TENANT_HEADER.to_string(), "acme".to_string()),
                (TENANT_SCHEMA_HEADER.to_string(), "acme".to_string()),
            ]
        );
    }

    #[test]
    fn stale_response_dropped_after_switch() {
        let ctx = TenantContext::in_memory();
        ctx.set_tenant(TenantId::parse("acme").unwrap());
        let client = ApiClient::new("http://api", ctx.clone());

        let req = client.request("api/v1/banners").unwrap();
        ctx.set_tenant(TenantId::parse("other").unwrap());
        assert_eq!(req.accept(&ctx, "banners"), None);

        let fresh = client.request("api/v1/banners").unwrap();
        assert_eq!(fresh.accept(&ctx, "banners"), Some("banners"));
    }
}
