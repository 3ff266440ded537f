//! # Storefront Tenant
//!
//! Resolves which store ("tenant") an incoming storefront request belongs to
//! and keeps that identity consistent for the rest of the session.
//!
//! Resolution is a pure function of `{host, path}` plus an explicit
//! [`ResolutionMode`]. The same procedure backs both the edge tagging step
//! and client-side re-resolution; the only knob that differs between the two
//! is the [`LoopbackPolicy`].
//!
//! ```text
//! request → edge::EdgeTagger (x-tenant, x-tenant-schema)
//!         → session::Session::boot → state::TenantContext
//!         → assets / api (read the propagated tenant)
//! ```

pub mod api;
pub mod assets;
pub mod config;
pub mod edge;
#[cfg(feature = "napi")]
pub mod node;
pub mod reserved;
pub mod resolver;
pub mod session;
pub mod slug;
pub mod state;

use std::fmt;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::TenantConfig;
pub use edge::{EdgeDecision, EdgeTagger};
pub use resolver::{ResolveInput, Resolver};
pub use session::Session;
pub use state::TenantContext;

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// Primary tenant header set on tagged responses and outgoing API calls.
pub const TENANT_HEADER: &str = "x-tenant";

/// Schema header. Always carries the same value as [`TENANT_HEADER`].
pub const TENANT_SCHEMA_HEADER: &str = "x-tenant-schema";

/// Key of the durable client-side mirror entry.
pub const STORAGE_KEY: &str = "current_tenant";

/// Tenant used when nothing else is available.
pub const DEFAULT_TENANT: &str = "public";

// ---------------------------------------------------------------------------
// Tenant Identifier
// ---------------------------------------------------------------------------

/// A syntactically valid, lowercase tenant slug.
///
/// Construction goes through [`TenantId::parse`], which folds ASCII case and
/// applies the slug grammar. Whether the tenant actually exists is the
/// backend's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(ArcStr);

impl TenantId {
    /// Case-fold `raw` and accept it if it matches the slug grammar.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = raw.to_ascii_lowercase();
        if slug::is_valid_slug(&folded) {
            Some(Self(ArcStr::from(folded)))
        } else {
            None
        }
    }

    /// The built-in [`DEFAULT_TENANT`].
    pub fn fallback() -> Self {
        Self(ArcStr::from(DEFAULT_TENANT))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(TenantError::InvalidSlug(value))
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0.to_string()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of running the resolver against one `{host, path}` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A valid, non-reserved slug was found.
    Tenant(TenantId),
    /// System route, reserved word, or malformed input.
    NoTenant,
}

impl Resolution {
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            Resolution::Tenant(id) => Some(id),
            Resolution::NoTenant => None,
        }
    }

    pub fn into_tenant(self) -> Option<TenantId> {
        match self {
            Resolution::Tenant(id) => Some(id),
            Resolution::NoTenant => None,
        }
    }

    pub fn is_tenant(&self) -> bool {
        matches!(self, Resolution::Tenant(_))
    }
}

impl From<Option<TenantId>> for Resolution {
    fn from(value: Option<TenantId>) -> Self {
        value.map_or(Resolution::NoTenant, Resolution::Tenant)
    }
}

// ---------------------------------------------------------------------------
// Resolution Mode
// ---------------------------------------------------------------------------

/// Which inputs the resolver consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Production: only the first DNS label.
    Subdomain,
    /// Development: only the first path segment, whatever the host.
    PathPrefix,
    /// Subdomain first; path prefix only on loopback hosts.
    #[default]
    Auto,
}

impl std::str::FromStr for ResolutionMode {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subdomain" => Ok(ResolutionMode::Subdomain),
            "path_prefix" | "path-prefix" | "path" => Ok(ResolutionMode::PathPrefix),
            "auto" => Ok(ResolutionMode::Auto),
            other => Err(TenantError::Config(format!(
                "unknown resolution mode '{other}' (expected subdomain, path_prefix or auto)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Loopback Policy
// ---------------------------------------------------------------------------

/// Which hosts count as "local" for the path-prefix fallback in
/// [`ResolutionMode::Auto`].
///
/// The edge tagger and the client resolver deliberately disagree here: the
/// client also accepts LAN hosts so the storefront can be opened from other
/// devices on the same network. Both are kept, selected per resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopbackPolicy {
    /// `localhost` and `127.0.0.1` only.
    Strict,
    /// Strict, plus `192.168.*` hosts and any `*.local` host.
    Lan,
}

impl LoopbackPolicy {
    /// `host` must already have its port removed.
    pub fn matches(self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let strict = host == "localhost" || host == "127.0.0.1";
        match self {
            LoopbackPolicy::Strict => strict,
            LoopbackPolicy::Lan => {
                strict || host.starts_with("192.168.") || host.ends_with(".local")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TenantError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("'{0}' is not a valid tenant slug")]
    InvalidSlug(String),

    #[error("no tenant is resolved for this session")]
    Unresolved,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Durable mirror error: {0}")]
    Mirror(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve a tenant with the default client-side rules.
///
/// Shorthand for `Resolver::client().resolve(&ResolveInput::new(host, path))`.
pub fn resolve_tenant(host: &str, path: &str) -> Resolution {
    Resolver::client().resolve(&ResolveInput::new(host, path))
}
