//! Resolution configuration.
//!
//! Loaded from a JSON file (every field optional), then overridden from the
//! environment, then validated. Both resolvers are derived from the same
//! config so the edge and client can only differ where the config says so.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::edge::{EdgeTagger, DEFAULT_BYPASS_PREFIXES};
use crate::reserved::{ReservedWords, DEFAULT_RESERVED_ROUTES, DEFAULT_RESERVED_SUBDOMAINS};
use crate::resolver::Resolver;
use crate::{LoopbackPolicy, ResolutionMode, TenantError, TenantId, DEFAULT_TENANT, STORAGE_KEY};

/// Base URL of the storefront REST API when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:80";

pub const ENV_API_URL: &str = "STOREFRONT_API_URL";
pub const ENV_DEFAULT_TENANT: &str = "STOREFRONT_DEFAULT_TENANT";
pub const ENV_RESOLUTION_MODE: &str = "STOREFRONT_RESOLUTION_MODE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenantConfig {
    pub mode: ResolutionMode,
    /// Loopback hosts for the edge tagger.
    pub edge_loopback: LoopbackPolicy,
    /// Loopback hosts for client-side re-resolution.
    pub client_loopback: LoopbackPolicy,
    pub reserved_subdomains: Vec<String>,
    pub reserved_routes: Vec<String>,
    /// First path segments the edge never resolves.
    pub bypass_prefixes: Vec<String>,
    pub default_tenant: String,
    pub api_base_url: String,
    /// Mirror key for the persisted tenant. Keyed mirrors handed to
    /// [`crate::Session::start`] must use it.
    pub storage_key: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::Auto,
            edge_loopback: LoopbackPolicy::Strict,
            client_loopback: LoopbackPolicy::Lan,
            reserved_subdomains: to_owned(DEFAULT_RESERVED_SUBDOMAINS),
            reserved_routes: to_owned(DEFAULT_RESERVED_ROUTES),
            bypass_prefixes: to_owned(DEFAULT_BYPASS_PREFIXES),
            default_tenant: DEFAULT_TENANT.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_key: STORAGE_KEY.to_string(),
        }
    }
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl TenantConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, TenantError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TenantError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            TenantError::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Load `path` if given, otherwise start from defaults; then apply the
    /// environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, TenantError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self, TenantError> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, TenantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(tenant) = get(ENV_DEFAULT_TENANT) {
            self.default_tenant = tenant;
        }
        if let Some(mode) = get(ENV_RESOLUTION_MODE) {
            self.mode = mode.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), TenantError> {
        self.default_tenant()?;
        if self.storage_key.trim().is_empty() {
            return Err(TenantError::Config("storage_key must not be empty".into()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(TenantError::Config("api_base_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn default_tenant(&self) -> Result<TenantId, TenantError> {
        TenantId::parse(&self.default_tenant).ok_or_else(|| {
            TenantError::Config(format!(
                "default_tenant '{}' is not a valid tenant slug",
                self.default_tenant
            ))
        })
    }

    /// API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    fn resolver(&self, loopback: LoopbackPolicy) -> Resolver {
        Resolver::new(
            self.mode,
            loopback,
            ReservedWords::new(&self.reserved_subdomains),
            ReservedWords::new(&self.reserved_routes),
        )
    }

    pub fn edge_resolver(&self) -> Resolver {
        self.resolver(self.edge_loopback)
    }

    pub fn client_resolver(&self) -> Resolver {
        self.resolver(self.client_loopback)
    }

    pub fn edge_tagger(&self) -> EdgeTagger {
        EdgeTagger::new(self.edge_resolver(), ReservedWords::new(&self.bypass_prefixes))
    }
}
