//! Node bindings for Next.js-style edge middleware.
//!
//! Exposes the same decision procedure the Rust side uses, so middleware
//! and browser code cannot drift from it.

use std::collections::HashMap;

use napi_derive::napi;

use crate::edge::EdgeTagger;
use crate::resolver::{self, ResolveInput, Resolver};
use crate::{slug, LoopbackPolicy, ResolutionMode, TenantId};

fn to_napi_error(e: crate::TenantError) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Resolve a tenant from `host` and `path`.
///
/// `mode` is `auto` (default), `subdomain` or `path_prefix`; `lan` widens the
/// loopback check to LAN hosts as the browser does.
#[napi]
pub fn resolve_tenant(
    host: String,
    path: String,
    mode: Option<String>,
    lan: Option<bool>,
) -> napi::Result<Option<String>> {
    let mode = match mode {
        Some(mode) => mode.parse::<ResolutionMode>().map_err(to_napi_error)?,
        None => ResolutionMode::Auto,
    };
    let loopback = if lan.unwrap_or(false) {
        LoopbackPolicy::Lan
    } else {
        LoopbackPolicy::Strict
    };

    let resolver = Resolver::edge().with_mode(mode).with_loopback(loopback);
    Ok(resolver
        .resolve(&ResolveInput::new(&host, &path))
        .into_tenant()
        .map(String::from))
}

/// Headers to set on the response, or `null` for bypassed and untagged
/// requests.
#[napi]
pub fn edge_tags(host: String, path: String) -> Option<HashMap<String, String>> {
    let decision = EdgeTagger::default().decide(&host, &path);
    decision.tenant()?;
    let mut headers = HashMap::new();
    decision.apply(&mut headers);
    Some(headers)
}

#[napi]
pub fn strip_tenant_prefix(path: String, tenant: String) -> napi::Result<String> {
    let tenant = TenantId::parse(&tenant)
        .ok_or_else(|| napi::Error::from_reason(format!("'{tenant}' is not a valid tenant slug")))?;
    Ok(resolver::strip_tenant_prefix(&path, &tenant))
}

#[napi]
pub fn is_valid_slug(token: String) -> bool {
    slug::is_valid_slug(&token)
}
