//! Session lifecycle.
//!
//! A [`Session`] owns the tenant context for one browsing session. It is
//! started explicitly, booted from the first location it sees (falling back
//! to the persisted tenant), kept in sync as the user navigates, and ended
//! explicitly. Nothing here is process-global; two sessions never share
//! state unless they share a mirror.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::assets::ImageUrls;
use crate::config::TenantConfig;
use crate::resolver::{ResolveInput, Resolver};
use crate::state::mirror::{MemoryMirror, TenantMirror};
use crate::state::TenantContext;
use crate::{Resolution, TenantError, TenantId};

/// How the session obtained its first tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BootOutcome {
    /// From the live host/path.
    Resolved { tenant: TenantId },
    /// From the durable mirror left by an earlier page load.
    Restored { tenant: TenantId },
    /// Nothing to go on; the caller shows a fallback.
    Unresolved,
}

impl BootOutcome {
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            BootOutcome::Resolved { tenant } | BootOutcome::Restored { tenant } => Some(tenant),
            BootOutcome::Unresolved => None,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    resolver: Resolver,
    context: TenantContext,
    default_tenant: TenantId,
    api_base: String,
}

impl Session {
    /// Start a session using the client-side rules from `config`.
    ///
    /// A keyed mirror must persist under `config.storage_key`.
    pub fn start(config: &TenantConfig, mirror: Arc<dyn TenantMirror>) -> Result<Self, TenantError> {
        if let Some(key) = mirror.key() {
            if key != config.storage_key {
                return Err(TenantError::Config(format!(
                    "mirror key '{key}' does not match storage_key '{}'",
                    config.storage_key
                )));
            }
        }
        Ok(Self {
            resolver: config.client_resolver(),
            context: TenantContext::new(mirror),
            default_tenant: config.default_tenant()?,
            api_base: config.api_base().to_string(),
        })
    }

    /// Session with default config and an in-memory mirror keyed by the
    /// default storage key.
    pub fn in_memory() -> Self {
        let config = TenantConfig::default();
        Self {
            resolver: config.client_resolver(),
            context: TenantContext::new(Arc::new(MemoryMirror::with_key(config.storage_key.clone()))),
            default_tenant: TenantId::fallback(),
            api_base: config.api_base().to_string(),
        }
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn default_tenant(&self) -> &TenantId {
        &self.default_tenant
    }

    /// Establish the tenant at page load.
    ///
    /// The live location wins; without one (or when it yields nothing) the
    /// persisted tenant is restored.
    pub fn boot(&self, location: Option<ResolveInput<'_>>) -> BootOutcome {
        let resolved = location.and_then(|input| self.resolver.resolve(&input).into_tenant());
        let outcome = if let Some(tenant) = resolved {
            self.context.set_tenant(tenant.clone());
            BootOutcome::Resolved { tenant }
        } else if let Some(tenant) = self.context.persisted() {
            self.context.set_tenant(tenant.clone());
            BootOutcome::Restored { tenant }
        } else {
            BootOutcome::Unresolved
        };
        debug!(outcome = ?outcome, "session booted");
        outcome
    }

    /// Adopt the tenant named by the current route.
    ///
    /// Sets the context only when it differs; refreshes the mirror when it
    /// disagrees even if the in-memory value already matches.
    pub fn enter_route(&self, route_tenant: &TenantId) -> bool {
        if self.context.current().as_ref() != Some(route_tenant) || !self.context.is_resolved() {
            return self.context.set_tenant(route_tenant.clone());
        }
        if self.context.persisted().as_ref() != Some(route_tenant) {
            if let Err(e) = self.context.mirror().store(route_tenant.as_str()) {
                warn!(tenant = %route_tenant, error = %e, "failed to persist tenant");
            }
        }
        false
    }

    /// Re-resolve after client-side navigation.
    ///
    /// A location that resolves to a tenant updates the context; one that
    /// does not (a reserved route, say) leaves it as is.
    pub fn navigate(&self, location: ResolveInput<'_>) -> Resolution {
        let resolution = self.resolver.resolve(&location);
        if let Resolution::Tenant(tenant) = &resolution {
            self.context.set_tenant(tenant.clone());
        }
        resolution
    }

    /// Tenant to render for: current, else persisted, else the default.
    pub fn effective_tenant(&self) -> TenantId {
        self.context
            .current()
            .or_else(|| self.context.persisted())
            .unwrap_or_else(|| self.default_tenant.clone())
    }

    /// Where the root page redirects: the persisted tenant's home, or the
    /// default tenant's.
    pub fn landing_path(&self) -> String {
        let tenant = self
            .context
            .persisted()
            .unwrap_or_else(|| self.default_tenant.clone());
        format!("/{tenant}")
    }

    pub fn api_client(&self) -> ApiClient {
        ApiClient::new(self.api_base.clone(), self.context.clone())
    }

    pub fn image_urls(&self) -> ImageUrls {
        ImageUrls::new(self.api_base.clone(), self.context.clone())
    }

    /// Logout or explicit reset of tenant context.
    pub fn reset(&self) {
        self.context.clear_tenant();
    }

    /// End the session. The persisted tenant survives for the next one.
    pub fn end(self) {
        debug!(tenant = ?self.context.current(), "session ended");
    }
}
