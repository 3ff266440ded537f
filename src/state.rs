//! Session-scoped "current tenant".
//!
//! [`TenantContext`] is the single source of truth for which tenant the
//! session is looking at. It is created by the session, handed by reference
//! (or cheap clone) to every dependent, and mirrored into durable storage on
//! every write.
//!
//! Writes are synchronous: the mirror is updated before `set_tenant`
//! returns, so a read right after a write always sees the new value.
//! Dependents that cache tenant-scoped data [`subscribe`](TenantContext::subscribe)
//! and drop their caches when the tenant changes.

pub mod mirror;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::TenantId;
use mirror::{MemoryMirror, TenantMirror};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the tenant state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSnapshot {
    pub current: Option<TenantId>,
    pub is_resolved: bool,
}

impl TenantSnapshot {
    /// Whether a dependent expecting `expected` may start fetching.
    pub fn is_ready_for(&self, expected: &TenantId) -> bool {
        self.is_resolved && self.current.as_ref() == Some(expected)
    }
}

// ---------------------------------------------------------------------------
// TenantContext
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Inner {
    state: watch::Sender<TenantSnapshot>,
    mirror: Arc<dyn TenantMirror>,
}

/// Shared handle to the session's tenant state.
#[derive(Debug, Clone)]
pub struct TenantContext {
    inner: Arc<Inner>,
}

impl TenantContext {
    pub fn new(mirror: Arc<dyn TenantMirror>) -> Self {
        let (state, _) = watch::channel(TenantSnapshot::default());
        Self {
            inner: Arc::new(Inner { state, mirror }),
        }
    }

    /// Context backed by a fresh in-memory mirror.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMirror::new()))
    }

    pub fn mirror(&self) -> &Arc<dyn TenantMirror> {
        &self.inner.mirror
    }

    /// Make `tenant` current and persist it.
    ///
    /// Returns `true` when the current tenant actually changed. Setting the
    /// same tenant again leaves the state untouched and does not wake
    /// subscribers.
    pub fn set_tenant(&self, tenant: TenantId) -> bool {
        let mut previous = None;
        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_resolved && state.current.as_ref() == Some(&tenant) {
                return false;
            }
            previous = state.current.replace(tenant.clone());
            state.is_resolved = true;
            true
        });

        if changed {
            match &previous {
                Some(from) => info!(from = %from, to = %tenant, "tenant switched"),
                None => info!(tenant = %tenant, "tenant resolved"),
            }
        }

        if let Err(e) = self.inner.mirror.store(tenant.as_str()) {
            warn!(tenant = %tenant, error = %e, "failed to persist tenant");
        }
        changed
    }

    /// Forget the current tenant and its persisted copy.
    pub fn clear_tenant(&self) {
        let changed = self.inner.state.send_if_modified(|state| {
            if !state.is_resolved && state.current.is_none() {
                return false;
            }
            *state = TenantSnapshot::default();
            true
        });
        if changed {
            info!("tenant cleared");
        }

        if let Err(e) = self.inner.mirror.remove() {
            warn!(error = %e, "failed to remove persisted tenant");
        }
    }

    pub fn snapshot(&self) -> TenantSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn current(&self) -> Option<TenantId> {
        self.inner.state.borrow().current.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.state.borrow().is_resolved
    }

    /// Gate for the first data fetch of a page that expects `expected`.
    pub fn is_ready_for(&self, expected: &TenantId) -> bool {
        self.inner.state.borrow().is_ready_for(expected)
    }

    /// Tenant stored in the durable mirror, if any and if still valid.
    ///
    /// Storage errors and garbage values read as "nothing persisted".
    pub fn persisted(&self) -> Option<TenantId> {
        match self.inner.mirror.load() {
            Ok(Some(raw)) => {
                let parsed = TenantId::parse(&raw);
                if parsed.is_none() {
                    warn!(value = %raw, "ignoring malformed persisted tenant");
                }
                parsed
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read persisted tenant");
                None
            }
        }
    }

    /// Receive a notification on every tenant change.
    pub fn subscribe(&self) -> TenantWatch {
        TenantWatch {
            rx: self.inner.state.subscribe(),
        }
    }

    /// Capture the current tenant for a request about to go out.
    ///
    /// `None` when no tenant is resolved.
    pub fn guard(&self) -> Option<FetchGuard> {
        let state = self.inner.state.borrow();
        if !state.is_resolved {
            return None;
        }
        state.current.clone().map(|tenant| FetchGuard { tenant })
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::in_memory()
    }
}

// ---------------------------------------------------------------------------
// TenantWatch
// ---------------------------------------------------------------------------

/// Change feed for dependents holding tenant-scoped caches.
#[derive(Debug)]
pub struct TenantWatch {
    rx: watch::Receiver<TenantSnapshot>,
}

impl TenantWatch {
    /// Wait for the next change. `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<TenantSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until `expected` is the resolved tenant.
    ///
    /// Returns `false` if the context is dropped first.
    pub async fn ready_for(&mut self, expected: &TenantId) -> bool {
        self.rx
            .wait_for(|state| state.is_ready_for(expected))
            .await
            .is_ok()
    }

    pub fn latest(&self) -> TenantSnapshot {
        self.rx.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// FetchGuard
// ---------------------------------------------------------------------------

/// Tenant captured when a fetch started.
///
/// A tenant switch does not cancel in-flight fetches; their results are
/// discarded on arrival instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchGuard {
    tenant: TenantId,
}

impl FetchGuard {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Whether the session is still on the tenant this fetch was for.
    pub fn is_current(&self, context: &TenantContext) -> bool {
        context.is_ready_for(&self.tenant)
    }

    /// Pass `value` through only if the tenant has not changed.
    pub fn accept<T>(&self, context: &TenantContext, value: T) -> Option<T> {
        if self.is_current(context) {
            Some(value)
        } else {
            warn!(tenant = %self.tenant, "discarding response for stale tenant");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// TenantScoped
// ---------------------------------------------------------------------------

/// A cached value that belongs to exactly one tenant.
///
/// Reads through a context whose tenant differs from the owner drop the
/// value, so a tenant switch never exposes the previous store's data.
#[derive(Debug, Clone)]
pub struct TenantScoped<T> {
    slot: Option<(TenantId, T)>,
}

impl<T> TenantScoped<T> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Store `value` for the tenant `guard` was taken for.
    ///
    /// Refused (and `false` returned) if that tenant is no longer current.
    pub fn insert(&mut self, context: &TenantContext, guard: &FetchGuard, value: T) -> bool {
        match guard.accept(context, value) {
            Some(value) => {
                self.slot = Some((guard.tenant.clone(), value));
                true
            }
            None => false,
        }
    }

    pub fn get(&mut self, context: &TenantContext) -> Option<&T> {
        let owner_is_current = match &self.slot {
            Some((owner, _)) => context.is_ready_for(owner),
            None => return None,
        };
        if !owner_is_current {
            self.slot = None;
            return None;
        }
        self.slot.as_ref().map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

impl<T> Default for TenantScoped<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::mirror::UnavailableMirror;
    use super::*;
    use crate::STORAGE_KEY;

    fn tenant(s: &str) -> TenantId {
        TenantId::parse(s).unwrap()
    }

    #[test]
    fn starts_unresolved() {
        let ctx = TenantContext::in_memory();
        assert_eq!(ctx.snapshot(), TenantSnapshot::default());
        assert!(ctx.guard().is_none());
    }

    #[test]
    fn set_writes_mirror() {
        let mirror = MemoryMirror::new();
        let ctx = TenantContext::new(Arc::new(mirror.clone()));
        assert!(ctx.set_tenant(tenant("acme")));
        assert_eq!(ctx.current(), Some(tenant("acme")));
        assert!(ctx.is_resolved());
        assert_eq!(mirror.get(STORAGE_KEY), Some("acme".into()));
    }

    #[test]
    fn set_is_idempotent() {
        let ctx = TenantContext::in_memory();
        assert!(ctx.set_tenant(tenant("acme")));
        let once = ctx.snapshot();
        assert!(!ctx.set_tenant(tenant("acme")));
        assert_eq!(ctx.snapshot(), once);
    }

    #[test]
    fn clear_removes_mirror() {
        let mirror = MemoryMirror::new();
        let ctx = TenantContext::new(Arc::new(mirror.clone()));
        ctx.set_tenant(tenant("acme"));
        ctx.clear_tenant();
        assert_eq!(ctx.snapshot(), TenantSnapshot::default());
        assert_eq!(mirror.get(STORAGE_KEY), None);
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let ctx = TenantContext::new(Arc::new(UnavailableMirror));
        assert!(ctx.set_tenant(tenant("acme")));
        assert_eq!(ctx.current(), Some(tenant("acme")));
        assert_eq!(ctx.persisted(), None);
        ctx.clear_tenant();
        assert!(!ctx.is_resolved());
    }

    #[test]
    fn malformed_persisted_value_is_ignored() {
        let mirror = MemoryMirror::new();
        mirror.set(STORAGE_KEY, "no");
        let ctx = TenantContext::new(Arc::new(mirror));
        assert_eq!(ctx.persisted(), None);
    }

    #[test]
    fn readiness_requires_matching_tenant() {
        let ctx = TenantContext::in_memory();
        let acme = tenant("acme");
        assert!(!ctx.is_ready_for(&acme));
        ctx.set_tenant(tenant("other"));
        assert!(!ctx.is_ready_for(&acme));
        ctx.set_tenant(acme.clone());
        assert!(ctx.is_ready_for(&acme));
    }

    #[test]
    fn guard_discards_stale_results() {
        let ctx = TenantContext::in_memory();
        ctx.set_tenant(tenant("acme"));
        let guard = ctx.guard().unwrap();
        assert_eq!(guard.accept(&ctx, 1), Some(1));

        ctx.set_tenant(tenant("other"));
        assert_eq!(guard.accept(&ctx, 2), None);
    }

    #[test]
    fn scoped_cache_resets_on_switch() {
        let ctx = TenantContext::in_memory();
        ctx.set_tenant(tenant("acme"));
        let guard = ctx.guard().unwrap();

        let mut banners = TenantScoped::new();
        assert!(banners.insert(&ctx, &guard, vec!["summer-sale"]));
        assert_eq!(banners.get(&ctx), Some(&vec!["summer-sale"]));

        ctx.set_tenant(tenant("other"));
        assert_eq!(banners.get(&ctx), None);

        // Switching back does not resurrect the dropped value.
        ctx.set_tenant(tenant("acme"));
        assert_eq!(banners.get(&ctx), None);
    }

    #[test]
    fn scoped_cache_refuses_stale_insert() {
        let ctx = TenantContext::in_memory();
        ctx.set_tenant(tenant("acme"));
        let guard = ctx.guard().unwrap();
        ctx.set_tenant(tenant("other"));

        let mut cache = TenantScoped::new();
        assert!(!cache.insert(&ctx, &guard, 42));
        assert_eq!(cache.get(&ctx), None);
    }

    #[tokio::test]
    async fn subscribers_see_switches() {
        let ctx = TenantContext::in_memory();
        let mut watch = ctx.subscribe();

        ctx.set_tenant(tenant("acme"));
        let seen = watch.changed().await.unwrap();
        assert_eq!(seen.current, Some(tenant("acme")));

        ctx.set_tenant(tenant("other"));
        let seen = watch.changed().await.unwrap();
        assert_eq!(seen.current, Some(tenant("other")));
    }

    #[tokio::test]
    async fn ready_for_waits_for_expected_tenant() {
        let ctx = TenantContext::in_memory();
        let mut watch = ctx.subscribe();
        let expected = tenant("acme");

        let setter = ctx.clone();
        let task = tokio::spawn(async move {
            setter.set_tenant(TenantId::parse("other").unwrap());
            setter.set_tenant(TenantId::parse("acme").unwrap());
        });

        assert!(watch.ready_for(&expected).await);
        task.await.unwrap();
    }
}
