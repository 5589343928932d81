//! Namespaced content cache with per-entry expiry.
//!
//! Each namespace is an independent keyspace with its own default TTL.
//! Expired entries read as absent and are dropped lazily on access or in bulk
//! by [`ContentCache::prune_expired`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::{Result, SnapError};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug)]
struct Namespace<V> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V> Namespace<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct ContentCache<V> {
    namespaces: RwLock<HashMap<String, Namespace<V>>>,
    default_namespace: String,
    default_ttl: Duration,
    auto_create: bool,
}

impl<V: Clone> ContentCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert(
            config.default_namespace.clone(),
            Namespace::new(config.default_ttl),
        );
        Self {
            namespaces: RwLock::new(namespaces),
            default_namespace: config.default_namespace.clone(),
            default_ttl: config.default_ttl,
            auto_create: config.auto_create_namespaces,
        }
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Create (or reset the TTL of) a namespace explicitly.
    pub fn create_namespace(&self, name: &str, ttl: Duration) {
        let mut namespaces = self.write();
        namespaces
            .entry(name.to_string())
            .and_modify(|ns| ns.ttl = ttl)
            .or_insert_with(|| Namespace::new(ttl));
    }

    /// Store `value` with the namespace's TTL.
    pub fn put(&self, namespace: Option<&str>, key: &str, value: V) -> Result<()> {
        self.insert(namespace, key, value, None)
    }

    /// Store `value` with an explicit TTL for this entry only.
    pub fn put_with_ttl(
        &self,
        namespace: Option<&str>,
        key: &str,
        value: V,
        ttl: Duration,
    ) -> Result<()> {
        self.insert(namespace, key, value, Some(ttl))
    }

    fn insert(&self, namespace: Option<&str>, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let name = self.resolve(namespace);
        let mut namespaces = self.write();
        if !namespaces.contains_key(name) {
            if !self.auto_create {
                return Err(SnapError::UnknownNamespace(name.to_string()));
            }
            tracing::debug!(namespace = name, "auto-creating cache namespace");
            namespaces.insert(name.to_string(), Namespace::new(self.default_ttl));
        }
        let Some(ns) = namespaces.get_mut(name) else {
            return Err(SnapError::UnknownNamespace(name.to_string()));
        };
        let ttl = ttl.unwrap_or(ns.ttl);
        ns.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    /// Value under `(namespace, key)` if present and unexpired.
    pub fn get(&self, namespace: Option<&str>, key: &str) -> Option<V> {
        let name = self.resolve(namespace);
        let now = Instant::now();
        {
            let namespaces = self.read();
            let entry = namespaces.get(name)?.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Expired: drop it so the map does not grow with dead entries.
        let mut namespaces = self.write();
        if let Some(ns) = namespaces.get_mut(name) {
            if ns.entries.get(key).is_some_and(|e| e.is_expired(now)) {
                ns.entries.remove(key);
            }
        }
        None
    }

    /// Remove an entry; a missing namespace or key is a no-op.
    pub fn evict(&self, namespace: Option<&str>, key: &str) {
        let name = self.resolve(namespace);
        if let Some(ns) = self.write().get_mut(name) {
            ns.entries.remove(key);
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for ns in self.write().values_mut() {
            let before = ns.entries.len();
            ns.entries.retain(|_, entry| !entry.is_expired(now));
            removed += before - ns.entries.len();
        }
        removed
    }

    /// Number of live entries in a namespace.
    pub fn len(&self, namespace: Option<&str>) -> usize {
        let name = self.resolve(namespace);
        let now = Instant::now();
        self.read()
            .get(name)
            .map(|ns| ns.entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: Option<&str>) -> bool {
        self.len(namespace) == 0
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.default_namespace)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Namespace<V>>> {
        self.namespaces
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Namespace<V>>> {
        self.namespaces
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
