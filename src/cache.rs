//! Two-tier reputation cache
//!
//! Maps a digest to a previously fetched remote verdict. The fast tier is an
//! in-process map; the persistent tier is one human-readable JSON file per
//! key under the cache directory. All operations are linearized through a
//! single lock so concurrent scans never interleave at the byte level.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Fallback file name when a key sanitizes down to nothing
const FALLBACK_NAME: &str = "cache";

/// Two-tier (memory + disk) cache for reputation payloads
pub struct ReputationCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    cache_dir: PathBuf,
    ttl: Option<Duration>,
    memory: HashMap<String, Value>,
}

impl ReputationCache {
    /// Create a cache rooted at `cache_dir`, creating the directory if needed.
    ///
    /// `ttl` bounds the age of disk entries; `None` means entries never expire.
    pub fn new(cache_dir: &Path, ttl: Option<Duration>) -> Result<Self> {
        fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;
        Ok(Self {
            inner: Mutex::new(CacheInner {
                cache_dir: cache_dir.to_path_buf(),
                ttl,
                memory: HashMap::new(),
            }),
        })
    }

    /// Look up a cached payload, memory tier first.
    ///
    /// A disk entry older than the TTL is deleted and treated as absent.
    /// A corrupt disk entry is a logged miss and is left in place.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if let Some(value) = inner.memory.get(key) {
            return Some(value.clone());
        }

        let path = inner.entry_path(key);
        if !path.exists() {
            return None;
        }

        if let Some(ttl) = inner.ttl {
            if entry_expired(&path, ttl) {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Failed to remove expired cache entry {}: {}", path.display(), e);
                }
                return None;
            }
        }

        match read_entry(&path) {
            Ok(value) => {
                inner.memory.insert(key.to_string(), value.clone());
                Some(value)
            }
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Store a payload in both tiers.
    ///
    /// The disk write goes to a temporary file first and is renamed into
    /// place, so a concurrent reader never sees a partial entry. A failed
    /// disk write is logged; the memory tier still holds the value.
    pub fn put(&self, key: &str, value: &Value) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.memory.insert(key.to_string(), value.clone());

        let path = inner.entry_path(key);
        if let Err(e) = write_entry(&path, value) {
            log::error!("Cache write failed for {}: {}", path.display(), e);
        }
    }

    /// Drop one key from both tiers
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.memory.remove(key);

        let path = inner.entry_path(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove cache entry {}: {}", path.display(), e);
            }
        }
    }

    /// Drop every entry from both tiers
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.memory.clear();

        let entries = match fs::read_dir(&inner.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Failed to read cache directory {}: {}",
                    inner.cache_dir.display(),
                    e
                );
                return;
            }
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Failed to remove cache entry {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl CacheInner {
    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Reduce a key to a filesystem-safe name: alphanumerics, `-` and `_` survive,
/// everything else is stripped. An empty result falls back to a fixed name.
fn sanitize_key(key: &str) -> String {
    let safe: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if safe.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        safe
    }
}

fn entry_expired(path: &Path, ttl: Duration) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return true;
    };
    let Ok(modified) = metadata.modified() else {
        return true;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age > ttl,
        // Clock skew put the mtime in the future; treat as fresh
        Err(_) => false,
    }
}

fn read_entry(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)?;
    Ok(value)
}

fn write_entry(path: &Path, value: &Value) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
