//! Scanner configuration
//!
//! A plain value constructed once and passed to whoever needs it, with no
//! global state. Settings come from an optional JSON file with `BLACKICE_*`
//! environment overrides applied during load, not at read time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration for the scanning core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// VirusTotal API key; required before a scan can start
    pub vt_api_key: String,
    /// SQLite database holding the signature table
    pub db_path: PathBuf,
    /// Directory for the on-disk reputation cache
    pub cache_dir: PathBuf,
    /// Reputation cache time-to-live in seconds; `None` disables expiry
    pub cache_ttl_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vt_api_key: String::new(),
            db_path: PathBuf::from("blackice.db"),
            cache_dir: PathBuf::from("cache"),
            cache_ttl_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional settings file, then apply
    /// environment overrides once.
    ///
    /// A missing or malformed file falls back to defaults with a logged
    /// warning; configuration problems surface later, when a component that
    /// actually needs the value is constructed.
    pub fn load(settings_file: Option<&Path>) -> Self {
        let mut config = match settings_file {
            Some(path) => read_settings(path),
            None => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    /// Cache TTL as a duration
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("BLACKICE_VT_API_KEY") {
            self.vt_api_key = key;
        }
        if let Ok(path) = std::env::var("BLACKICE_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("BLACKICE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(ttl) = std::env::var("BLACKICE_CACHE_TTL") {
            match ttl.parse() {
                Ok(secs) => self.cache_ttl_secs = Some(secs),
                Err(_) => log::warn!("Ignoring non-numeric BLACKICE_CACHE_TTL: {}", ttl),
            }
        }
    }
}

fn read_settings(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|content| {
        serde_json::from_str(&content).map_err(anyhow::Error::from)
    }) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load settings from {}: {}", path.display(), e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// `Config::load` reads process-global environment variables, so every
    /// test that loads a config or mutates `BLACKICE_*` holds this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 4] = [
        "BLACKICE_VT_API_KEY",
        "BLACKICE_DB_PATH",
        "BLACKICE_CACHE_DIR",
        "BLACKICE_CACHE_TTL",
    ];

    /// Run `f` with exactly the given `BLACKICE_*` variables set, restoring
    /// the caller's environment afterwards.
    fn with_env_vars<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap();
        let saved: Vec<(&str, Option<String>)> = OVERRIDE_VARS
            .iter()
            .map(|key| (*key, std::env::var(key).ok()))
            .collect();
        for key in OVERRIDE_VARS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.vt_api_key.is_empty());
        assert_eq!(config.db_path, PathBuf::from("blackice.db"));
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.cache_ttl(), None);
    }

    #[test]
    fn test_load_from_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = temp_dir.path().join("settings.json");
        fs::write(
            &settings,
            r#"{"vt_api_key": "k123", "cache_ttl_secs": 3600}"#,
        )
        .unwrap();

        let config = with_env_vars(&[], || Config::load(Some(&settings)));
        assert_eq!(config.vt_api_key, "k123");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(3600)));
        // Unspecified fields keep their defaults
        assert_eq!(config.db_path, PathBuf::from("blackice.db"));
    }

    #[test]
    fn test_env_overrides_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = temp_dir.path().join("settings.json");
        fs::write(&settings, r#"{"vt_api_key": "from-file"}"#).unwrap();

        let config = with_env_vars(
            &[
                ("BLACKICE_VT_API_KEY", "from-env"),
                ("BLACKICE_DB_PATH", "/opt/sigs.db"),
                ("BLACKICE_CACHE_DIR", "/var/cache/blackice"),
                ("BLACKICE_CACHE_TTL", "120"),
            ],
            || Config::load(Some(&settings)),
        );

        assert_eq!(config.vt_api_key, "from-env");
        assert_eq!(config.db_path, PathBuf::from("/opt/sigs.db"));
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/blackice"));
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_non_numeric_ttl_override_ignored() {
        let config =
            with_env_vars(&[("BLACKICE_CACHE_TTL", "soon")], || Config::load(None));
        assert_eq!(config.cache_ttl(), None);
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = temp_dir.path().join("settings.json");
        fs::write(&settings, "{ not json").unwrap();

        let config = with_env_vars(&[], || Config::load(Some(&settings)));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let config = with_env_vars(&[], || {
            Config::load(Some(Path::new("/nonexistent/settings.json")))
        });
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_settings_roundtrip() {
        let config = Config {
            vt_api_key: "k".into(),
            db_path: "sigs.db".into(),
            cache_dir: "/tmp/vtcache".into(),
            cache_ttl_secs: Some(60),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
