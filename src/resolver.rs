//! Tenant resolution.
//!
//! One decision procedure, parameterized by [`ResolutionMode`] and
//! [`LoopbackPolicy`], serves both the edge tagger and client-side
//! re-resolution:
//!
//! 1. Subdomain: host with the port removed, split on `.`; with 3 or more
//!    labels the first one, lowercased, is the tenant unless reserved or
//!    malformed.
//! 2. Path prefix: first non-empty path segment, lowercased, unless reserved
//!    or malformed. In `Auto` mode this only runs when step 1 found nothing
//!    AND the host is loopback under the configured policy.
//!
//! A reserved subdomain on a production host does not fall through to the
//! path.

use std::net::Ipv4Addr;

use tracing::debug;

use crate::reserved::ReservedWords;
use crate::{LoopbackPolicy, Resolution, ResolutionMode, TenantId};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// What the resolver reads from a request or from the browser location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveInput<'a> {
    /// Host/authority, possibly with a port.
    pub host: &'a str,
    /// Request path, possibly with a query string or fragment.
    pub path: &'a str,
}

impl<'a> ResolveInput<'a> {
    pub fn new(host: &'a str, path: &'a str) -> Self {
        Self { host, path }
    }

    /// Host without its `:port` suffix.
    pub fn bare_host(&self) -> &'a str {
        strip_port(self.host)
    }

    /// Path without query string or fragment.
    pub fn route(&self) -> &'a str {
        route_of(self.path)
    }
}

/// Everything before the first `:`.
pub fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or_default()
}

/// Everything before the first `?` or `#`.
pub fn route_of(path: &str) -> &str {
    match path.find(|c: char| c == '?' || c == '#') {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// First non-empty `/`-separated segment.
fn first_segment(route: &str) -> Option<&str> {
    route.split('/').find(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Resolver {
    mode: ResolutionMode,
    loopback: LoopbackPolicy,
    reserved_subdomains: ReservedWords,
    reserved_routes: ReservedWords,
}

impl Resolver {
    pub fn new(
        mode: ResolutionMode,
        loopback: LoopbackPolicy,
        reserved_subdomains: ReservedWords,
        reserved_routes: ReservedWords,
    ) -> Self {
        Self {
            mode,
            loopback,
            reserved_subdomains,
            reserved_routes,
        }
    }

    /// Default rules used when tagging requests at the edge.
    pub fn edge() -> Self {
        Self::new(
            ResolutionMode::Auto,
            LoopbackPolicy::Strict,
            ReservedWords::default_subdomains(),
            ReservedWords::default_routes(),
        )
    }

    /// Default rules used for in-browser re-resolution.
    pub fn client() -> Self {
        Self::new(
            ResolutionMode::Auto,
            LoopbackPolicy::Lan,
            ReservedWords::default_subdomains(),
            ReservedWords::default_routes(),
        )
    }

    pub fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_loopback(mut self, loopback: LoopbackPolicy) -> Self {
        self.loopback = loopback;
        self
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn loopback(&self) -> LoopbackPolicy {
        self.loopback
    }

    pub fn reserved_subdomains(&self) -> &ReservedWords {
        &self.reserved_subdomains
    }

    pub fn reserved_routes(&self) -> &ReservedWords {
        &self.reserved_routes
    }

    /// Run the decision procedure. First match wins.
    pub fn resolve(&self, input: &ResolveInput<'_>) -> Resolution {
        let resolution = match self.mode {
            ResolutionMode::Subdomain => self.from_subdomain(input.host).into(),
            ResolutionMode::PathPrefix => self.from_path(input.path).into(),
            ResolutionMode::Auto => match self.from_subdomain(input.host) {
                Some(tenant) => Resolution::Tenant(tenant),
                None if self.is_loopback(input.host) => self.from_path(input.path).into(),
                None => Resolution::NoTenant,
            },
        };

        debug!(
            host = input.host,
            path = input.path,
            mode = ?self.mode,
            tenant = resolution.tenant().map(TenantId::as_str),
            "resolved tenant"
        );
        resolution
    }

    /// Tenant from the first DNS label, if the host has room for one.
    ///
    /// An IPv4 literal that the loopback policy covers has no subdomain, so
    /// dev hosts like `127.0.0.1` reach the path fallback. Any other IPv4
    /// literal is split into labels like a hostname.
    pub fn from_subdomain(&self, host: &str) -> Option<TenantId> {
        let host = strip_port(host);
        if host.parse::<Ipv4Addr>().is_ok() && self.loopback.matches(host) {
            return None;
        }
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 3 {
            return None;
        }
        let label = labels[0];
        if self.reserved_subdomains.contains(label) {
            return None;
        }
        TenantId::parse(label)
    }

    /// Tenant from the first path segment.
    pub fn from_path(&self, path: &str) -> Option<TenantId> {
        let segment = first_segment(route_of(path))?;
        if self.reserved_routes.contains(segment) {
            return None;
        }
        TenantId::parse(segment)
    }

    pub fn is_loopback(&self, host: &str) -> bool {
        self.loopback.matches(strip_port(host))
    }

    /// Whether `input` would be resolved from its path rather than its host.
    ///
    /// Only in that case does the path carry a tenant prefix.
    pub fn uses_path_prefix(&self, input: &ResolveInput<'_>) -> bool {
        match self.mode {
            ResolutionMode::Subdomain => false,
            ResolutionMode::PathPrefix => true,
            ResolutionMode::Auto => {
                self.from_subdomain(input.host).is_none() && self.is_loopback(input.host)
            }
        }
    }

    /// Routing base for the current location: `/{tenant}` in path-prefix
    /// resolution, empty otherwise.
    pub fn tenant_base_path(&self, input: &ResolveInput<'_>) -> String {
        if !self.uses_path_prefix(input) {
            return String::new();
        }
        match self.from_path(input.path) {
            Some(tenant) => format!("/{tenant}"),
            None => String::new(),
        }
    }

    /// Resolve `input` and strip the tenant segment from its path.
    ///
    /// Paths resolved via subdomain are returned with only the query and
    /// fragment removed.
    pub fn in_tenant_route(&self, input: &ResolveInput<'_>) -> String {
        let route = input.route();
        if !self.uses_path_prefix(input) {
            return route.to_string();
        }
        match self.resolve(input) {
            Resolution::Tenant(tenant) => strip_tenant_prefix(route, &tenant),
            Resolution::NoTenant => route.to_string(),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::client()
    }
}

// ---------------------------------------------------------------------------
// Path Prefix Stripping
// ---------------------------------------------------------------------------

/// Remove `tenant`'s leading segment from `path`.
///
/// `/acme/products` becomes `/products`; `/acme` becomes `/`. Paths whose
/// first segment is not the tenant come back unchanged (minus any query or
/// fragment).
pub fn strip_tenant_prefix(path: &str, tenant: &TenantId) -> String {
    let route = route_of(path);
    let trimmed = route.trim_start_matches('/');
    let (segment, rest) = match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    };

    if !segment.eq_ignore_ascii_case(tenant.as_str()) {
        return route.to_string();
    }
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
