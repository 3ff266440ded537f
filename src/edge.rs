//! Edge tagging.
//!
//! Runs once per inbound request, before any page logic. Static assets,
//! framework internals and API routes pass straight through; everything else
//! goes through the [`Resolver`] and, on success, gets the tenant attached as
//! two response headers carrying the same value.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::reserved::ReservedWords;
use crate::resolver::{route_of, ResolveInput, Resolver};
use crate::{TenantId, TENANT_HEADER, TENANT_SCHEMA_HEADER};

/// First path segments that are never tenant-scoped.
pub const DEFAULT_BYPASS_PREFIXES: &[&str] = &["_next", "api"];

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// What the edge did with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EdgeDecision {
    /// Asset, framework-internal or API path. Resolution was skipped.
    Bypass,
    /// Resolution ran and found no tenant.
    Untagged,
    /// Resolution found a tenant; the request carries both tags.
    Tagged { tenant: TenantId },
}

impl EdgeDecision {
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            EdgeDecision::Tagged { tenant } => Some(tenant),
            _ => None,
        }
    }

    /// Header pairs to attach. Empty unless tagged.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self.tenant() {
            Some(tenant) => tenant_headers(tenant).to_vec(),
            None => Vec::new(),
        }
    }

    /// Write the tags into `sink`. No-op unless tagged.
    pub fn apply<S: HeaderSink + ?Sized>(&self, sink: &mut S) {
        for (name, value) in self.headers() {
            sink.set_header(name, value);
        }
    }
}

/// The two header pairs that identify `tenant`.
pub fn tenant_headers(tenant: &TenantId) -> [(&'static str, String); 2] {
    [
        (TENANT_HEADER, tenant.to_string()),
        (TENANT_SCHEMA_HEADER, tenant.to_string()),
    ]
}

// ---------------------------------------------------------------------------
// Header Sink
// ---------------------------------------------------------------------------

/// Anything response headers can be written into.
pub trait HeaderSink {
    /// Set `name` to `value`, replacing a previous value.
    fn set_header(&mut self, name: &str, value: String);
}

impl HeaderSink for HashMap<String, String> {
    fn set_header(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }
}

impl HeaderSink for BTreeMap<String, String> {
    fn set_header(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }
}

impl HeaderSink for Vec<(String, String)> {
    fn set_header(&mut self, name: &str, value: String) {
        self.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.push((name.to_string(), value));
    }
}

// ---------------------------------------------------------------------------
// Edge Tagger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EdgeTagger {
    resolver: Resolver,
    bypass_prefixes: ReservedWords,
}

impl EdgeTagger {
    pub fn new(resolver: Resolver, bypass_prefixes: ReservedWords) -> Self {
        Self {
            resolver,
            bypass_prefixes,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Whether `path` skips resolution entirely.
    ///
    /// True for a reserved first segment (`/_next/...`, `/api/...`) or a
    /// file extension in the last segment (`/logo.png`, `/favicon.ico`).
    pub fn is_bypass(&self, path: &str) -> bool {
        let route = route_of(path);
        let mut segments = route.split('/').filter(|s| !s.is_empty());

        let Some(first) = segments.next() else {
            return false;
        };
        if self.bypass_prefixes.contains(first) {
            return true;
        }

        let last = segments.last().unwrap_or(first);
        last.contains('.')
    }

    /// Decide the tenant for one request.
    pub fn decide(&self, host: &str, path: &str) -> EdgeDecision {
        if self.is_bypass(path) {
            debug!(host, path, "edge bypass");
            return EdgeDecision::Bypass;
        }

        match self.resolver.resolve(&ResolveInput::new(host, path)).into_tenant() {
            Some(tenant) => EdgeDecision::Tagged { tenant },
            None => EdgeDecision::Untagged,
        }
    }

    /// Decide and write the tags into `sink` in one step.
    pub fn tag<S: HeaderSink + ?Sized>(&self, host: &str, path: &str, sink: &mut S) -> EdgeDecision {
        let decision = self.decide(host, path);
        decision.apply(sink);
        decision
    }
}

impl Default for EdgeTagger {
    fn default() -> Self {
        Self::new(Resolver::edge(), ReservedWords::new(DEFAULT_BYPASS_PREFIXES))
    }
}
