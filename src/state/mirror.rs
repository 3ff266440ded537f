//! Durable mirror of the current tenant.
//!
//! The storefront keeps the tenant in client-side key/value storage so a
//! full reload can restore it before resolution runs again. Failures here
//! never reach the user; [`crate::state::TenantContext`] logs and drops them.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{TenantError, STORAGE_KEY};

/// Key/value persistence for a single tenant string.
pub trait TenantMirror: Send + Sync + fmt::Debug {
    fn load(&self) -> Result<Option<String>, TenantError>;
    fn store(&self, tenant: &str) -> Result<(), TenantError>;
    fn remove(&self) -> Result<(), TenantError>;

    /// Storage key the tenant lives under, if the backend has one.
    fn key(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// MemoryMirror
// ---------------------------------------------------------------------------

/// Thread-safe in-memory key/value storage.
///
/// Clones share the same underlying map, so a clone handed to a second
/// session observes what the first one persisted (the "reload" case).
#[derive(Debug, Clone)]
pub struct MemoryMirror {
    key: String,
    entries: Arc<DashMap<String, String>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::with_key(STORAGE_KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Raw entry lookup, bypassing the tenant key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Raw entry write, bypassing the tenant key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl Default for MemoryMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantMirror for MemoryMirror {
    fn load(&self) -> Result<Option<String>, TenantError> {
        Ok(self.get(&self.key))
    }

    fn store(&self, tenant: &str) -> Result<(), TenantError> {
        self.set(self.key.clone(), tenant);
        Ok(())
    }

    fn remove(&self) -> Result<(), TenantError> {
        self.entries.remove(&self.key);
        Ok(())
    }

    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }
}

// ---------------------------------------------------------------------------
// FileMirror
// ---------------------------------------------------------------------------

/// JSON object on disk, one entry per key.
///
/// Other keys in the file are preserved across writes.
#[derive(Debug, Clone)]
pub struct FileMirror {
    path: PathBuf,
    key: String,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key(path, STORAGE_KEY)
    }

    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, TenantError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), TenantError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl TenantMirror for FileMirror {
    fn load(&self) -> Result<Option<String>, TenantError> {
        Ok(self.read_entries()?.remove(&self.key))
    }

    fn store(&self, tenant: &str) -> Result<(), TenantError> {
        let mut entries = self.read_entries()?;
        entries.insert(self.key.clone(), tenant.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self) -> Result<(), TenantError> {
        let mut entries = self.read_entries()?;
        if entries.remove(&self.key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }

    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }
}

// ---------------------------------------------------------------------------
// UnavailableMirror
// ---------------------------------------------------------------------------

/// Storage that is switched off (private browsing, server-side rendering).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableMirror;

impl TenantMirror for UnavailableMirror {
    fn load(&self) -> Result<Option<String>, TenantError> {
        Err(TenantError::Mirror("storage unavailable".into()))
    }

    fn store(&self, _tenant: &str) -> Result<(), TenantError> {
        Err(TenantError::Mirror("storage unavailable".into()))
    }

    fn remove(&self) -> Result<(), TenantError> {
        Err(TenantError::Mirror("storage unavailable".into()))
    }
}
