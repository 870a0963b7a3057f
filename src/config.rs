//! Credentials and provider settings.
//!
//! Keys come from the process environment, optionally seeded from `.env` in
//! the working directory and `<config dir>/geotasks/.env`. Variables already
//! set are never overridden.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const GEOCODE_KEY_VAR: &str = "GEOCODE_API_KEY";
pub const SEARCH_KEY_VAR: &str = "SEARCH_API_KEY";
pub const STATIC_KEY_VAR: &str = "API_KEY";
pub const LANG_VAR: &str = "GEOTASKS_LANG";
pub const TIMEOUT_VAR: &str = "GEOTASKS_TIMEOUT_SECS";

const DEFAULT_LANG: &str = "ru_RU";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not found in environment variables")]
    MissingKey(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub geocode_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub static_api_key: Option<String>,
    /// Response language for geocoder, search and static maps.
    pub lang: String,
    /// Per-request timeout for every HTTP call.
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocode_api_key: None,
            search_api_key: None,
            static_api_key: None,
            lang: DEFAULT_LANG.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load `.env` files, then read the environment.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Ignoring .env: {}", e),
        }
        if let Some(path) = Self::user_env_path() {
            Self::load_env_file(&path);
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn user_env_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("geotasks").join(".env"))
    }

    fn load_env_file(path: &Path) {
        if !path.exists() {
            return;
        }
        match dotenvy::from_path(path) {
            Ok(()) => log::debug!("Loaded {}", path.display()),
            Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
        }
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = get(TIMEOUT_VAR)
            .and_then(|v| match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(secs),
                _ => {
                    log::warn!("Invalid {}='{}', using {}s", TIMEOUT_VAR, v, DEFAULT_TIMEOUT_SECS);
                    None
                }
            })
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            geocode_api_key: get(GEOCODE_KEY_VAR),
            search_api_key: get(SEARCH_KEY_VAR),
            static_api_key: get(STATIC_KEY_VAR),
            lang: get(LANG_VAR).unwrap_or_else(|| DEFAULT_LANG.to_string()),
            timeout: Duration::from_secs(timeout),
        }
    }

    pub fn require_geocode_key(&self) -> Result<&str, ConfigError> {
        self.geocode_api_key.as_deref().ok_or(ConfigError::MissingKey(GEOCODE_KEY_VAR))
    }

    pub fn require_search_key(&self) -> Result<&str, ConfigError> {
        self.search_api_key.as_deref().ok_or(ConfigError::MissingKey(SEARCH_KEY_VAR))
    }

    pub fn require_static_key(&self) -> Result<&str, ConfigError> {
        self.static_api_key.as_deref().ok_or(ConfigError::MissingKey(STATIC_KEY_VAR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(|_| None);
        assert_eq!(cfg.lang, "ru_RU");
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.require_geocode_key(), Err(ConfigError::MissingKey("GEOCODE_API_KEY")));
        assert_eq!(cfg.require_search_key(), Err(ConfigError::MissingKey("SEARCH_API_KEY")));
        assert_eq!(cfg.require_static_key(), Err(ConfigError::MissingKey("API_KEY")));
    }

    #[test]
    fn test_keys_and_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("GEOCODE_API_KEY", "geo-123"),
            ("SEARCH_API_KEY", " search-456 "),
            ("API_KEY", ""),
            ("GEOTASKS_LANG", "en_US"),
            ("GEOTASKS_TIMEOUT_SECS", "3"),
        ]));
        assert_eq!(cfg.require_geocode_key(), Ok("geo-123"));
        assert_eq!(cfg.require_search_key(), Ok("search-456"));
        assert!(cfg.require_static_key().is_err());
        assert_eq!(cfg.lang, "en_US");
        assert_eq!(cfg.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_bad_timeout_falls_back() {
        let cfg = Config::from_lookup(lookup_from(&[("GEOTASKS_TIMEOUT_SECS", "soon")]));
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        let cfg = Config::from_lookup(lookup_from(&[("GEOTASKS_TIMEOUT_SECS", "0")]));
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_file_parsing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "GEOCODE_API_KEY=from-file\n# comment\nGEOTASKS_LANG=tr_TR\n").unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let cfg = Config::from_lookup(|k| vars.get(k).cloned());
        assert_eq!(cfg.require_geocode_key(), Ok("from-file"));
        assert_eq!(cfg.lang, "tr_TR");
    }

    #[test]
    fn test_env_file_does_not_override_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geotasks").join(".env");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "GEOTASKS_TEST_EXISTING_7F3A=from-file\nGEOTASKS_TEST_NEW_7F3A=new\n",
        )
        .unwrap();

        std::env::set_var("GEOTASKS_TEST_EXISTING_7F3A", "from-env");
        std::env::remove_var("GEOTASKS_TEST_NEW_7F3A");
        Config::load_env_file(&path);

        assert_eq!(std::env::var("GEOTASKS_TEST_EXISTING_7F3A").as_deref(), Ok("from-env"));
        assert_eq!(std::env::var("GEOTASKS_TEST_NEW_7F3A").as_deref(), Ok("new"));
    }

    #[test]
    fn test_missing_env_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent").join(".env");
        std::env::remove_var("GEOTASKS_TEST_ABSENT_7F3A");
        Config::load_env_file(&path);
        assert!(std::env::var("GEOTASKS_TEST_ABSENT_7F3A").is_err());
        assert!(!path.exists());
    }
}
