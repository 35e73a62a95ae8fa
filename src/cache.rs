//! TTL cache for provider lookups.
//!
//! Entries live in memory and, when a directory is configured, are
//! mirrored to `<dir>/<name>.json` so that prices and token metadata
//! survive between runs. Expired entries are dropped on load and on read.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::types::BaseCleanError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// A string-keyed cache with a fixed time-to-live per entry.
pub struct TtlCache<V> {
    name: String,
    ttl: Duration,
    file: Option<PathBuf>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Memory-only cache.
    pub fn in_memory(name: &str, ttl_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            ttl: Duration::seconds(ttl_secs as i64),
            file: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache persisted under `dir`. A missing or corrupt file starts empty.
    pub fn persistent(name: &str, ttl_secs: u64, dir: &Path) -> Self {
        let file = dir.join(format!("{name}.json"));
        let mut entries: HashMap<String, CacheEntry<V>> = match std::fs::read_to_string(&file) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(cache = name, error = %e, "Discarding unreadable cache file");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        let now = Utc::now();
        entries.retain(|_, e| e.expires_at > now);
        debug!(cache = name, entries = entries.len(), "Cache loaded");

        Self {
            name: name.to_string(),
            ttl: Duration::seconds(ttl_secs as i64),
            file: Some(file),
            entries: Mutex::new(entries),
        }
    }

    /// Build from config: persistent when a directory is given.
    pub fn from_dir(name: &str, ttl_secs: u64, dir: Option<&str>) -> Self {
        match dir {
            Some(d) => Self::persistent(name, ttl_secs, Path::new(d)),
            None => Self::in_memory(name, ttl_secs),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn insert(&self, key: &str, value: V) {
        self.insert_at(key, value, Utc::now());
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(e) if e.expires_at > now => Some(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert_at(&self, key: &str, value: V, now: DateTime<Utc>) {
        self.lock().insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache to disk. No-op for memory-only caches.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        let json = {
            let entries = self.lock();
            serde_json::to_string(&*entries)
                .map_err(|e| BaseCleanError::Cache(format!("Failed to serialise cache {}: {e}", self.name)))?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;

        debug!(cache = %self.name, path = %path.display(), "Cache flushed");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A poisoned cache only ever holds plain data; keep using it.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
