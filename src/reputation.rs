//! VirusTotal reputation client
//!
//! One HTTP GET per digest against the VT v3 files endpoint, fronted by the
//! two-tier [`ReputationCache`]. Only a successful, parseable response is
//! cached; failures of any kind surface as "no data" and the scan moves on.

use crate::cache::ReputationCache;
use anyhow::Result;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const VT_FILES_URL: &str = "https://www.virustotal.com/api/v3/files";

/// Bound on a single lookup, covering connect, send and read
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable consulted when no explicit key is given
pub const API_KEY_ENV: &str = "VIRUSTOTAL_API_KEY";

#[derive(Debug, Error)]
pub enum ReputationError {
    /// The client is useless without a credential, so this is fatal at
    /// construction rather than a per-lookup failure
    #[error("VT API key is not set")]
    MissingApiKey,
}

/// Source of reputation data for a digest.
///
/// The classifier and orchestrator depend on this seam so tests can stub the
/// remote service out entirely.
pub trait ReputationProvider: Send + Sync {
    /// Fetch the reputation payload for a digest, or `None` when no usable
    /// data is available (miss, network failure, unparseable response).
    fn lookup(&self, digest: &str) -> Option<Value>;
}

/// VirusTotal v3 API client with two-tier caching
pub struct ReputationClient {
    api_key: String,
    agent: ureq::Agent,
    cache: ReputationCache,
}

impl ReputationClient {
    /// Build a client from an explicit key, falling back to the
    /// `VIRUSTOTAL_API_KEY` environment variable.
    ///
    /// A missing or empty key is a construction-time error; callers must
    /// validate configuration before starting a scan that needs the client.
    pub fn new(
        api_key: Option<&str>,
        cache_dir: &Path,
        cache_ttl: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => std::env::var(API_KEY_ENV).unwrap_or_default(),
        };
        if api_key.is_empty() {
            return Err(ReputationError::MissingApiKey.into());
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build();

        Ok(Self {
            api_key,
            agent,
            cache: ReputationCache::new(cache_dir, cache_ttl)?,
        })
    }

    /// Drop any cached verdict for a digest
    pub fn invalidate(&self, digest: &str) {
        self.cache.invalidate(digest);
    }

    /// Drop every cached verdict
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn fetch(&self, digest: &str) -> Option<Value> {
        let url = format!("{}/{}", VT_FILES_URL, digest);
        let response = match self
            .agent
            .get(&url)
            .set("x-apikey", &self.api_key)
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                log::warn!("VT API status {}: {}", code, body);
                return None;
            }
            Err(e) => {
                log::error!("VT request failed: {}", e);
                return None;
            }
        };

        match response.into_json::<Value>() {
            Ok(data) => Some(data),
            Err(e) => {
                log::error!("VT JSON parse failed: {}", e);
                None
            }
        }
    }
}

impl ReputationProvider for ReputationClient {
    fn lookup(&self, digest: &str) -> Option<Value> {
        if let Some(cached) = self.cache.get(digest) {
            return Some(cached);
        }
        let data = self.fetch(digest)?;
        self.cache.put(digest, &data);
        Some(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// The API key environment variable is process-global; every test that
    /// reads or mutates it holds this lock so parallel test threads cannot
    /// observe each other's values.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with the key variable set (or removed), restoring the
    /// caller's environment afterwards.
    fn with_env_key<T>(value: Option<&str>, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap();
        let saved = std::env::var(API_KEY_ENV).ok();
        match value {
            Some(v) => std::env::set_var(API_KEY_ENV, v),
            None => std::env::remove_var(API_KEY_ENV),
        }

        let result = f();

        match saved {
            Some(v) => std::env::set_var(API_KEY_ENV, v),
            None => std::env::remove_var(API_KEY_ENV),
        }
        result
    }

    #[test]
    fn test_missing_key_is_fatal() {
        with_env_key(None, || {
            let temp_dir = TempDir::new().unwrap();
            let result = ReputationClient::new(None, temp_dir.path(), None);
            assert!(result.is_err());

            let result = ReputationClient::new(Some(""), temp_dir.path(), None);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_explicit_key_accepted() {
        with_env_key(None, || {
            let temp_dir = TempDir::new().unwrap();
            let client = ReputationClient::new(Some("test-key"), temp_dir.path(), None);
            assert!(client.is_ok());
        });
    }

    #[test]
    fn test_env_key_fallback() {
        with_env_key(Some("from-env"), || {
            let temp_dir = TempDir::new().unwrap();
            // No explicit key: the environment variable supplies it
            let client = ReputationClient::new(None, temp_dir.path(), None);
            assert!(client.is_ok());
            assert_eq!(client.unwrap().api_key, "from-env");

            // An empty explicit key also falls back to the environment
            let client = ReputationClient::new(Some(""), temp_dir.path(), None);
            assert!(client.is_ok());
        });
    }

    #[test]
    fn test_lookup_served_from_cache_without_network() {
        let temp_dir = TempDir::new().unwrap();
        let payload = json!({"data": {"attributes": {"last_analysis_stats": {"malicious": 1}}}});

        // Pre-seed the disk tier, then look up through the client. The
        // bogus key guarantees any network attempt would fail loudly.
        {
            let cache = ReputationCache::new(temp_dir.path(), None).unwrap();
            cache.put("abc123", &payload);
        }

        let client =
            ReputationClient::new(Some("bogus"), temp_dir.path(), None).unwrap();
        assert_eq!(client.lookup("abc123"), Some(payload));
    }

    #[test]
    fn test_invalidate_forwards_to_cache() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = ReputationCache::new(temp_dir.path(), None).unwrap();
            cache.put("abc123", &json!({"n": 1}));
        }

        let client =
            ReputationClient::new(Some("bogus"), temp_dir.path(), None).unwrap();
        client.invalidate("abc123");
        assert!(!temp_dir.path().join("abc123.json").exists());
    }
}
