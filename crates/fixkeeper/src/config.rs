//! Configuration for catalog access, state storage and game discovery

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FixError, Result};

/// Gitea-compatible API root hosting the fix projects
pub const DEFAULT_API_BASE: &str = "https://codeberg.org/api/v1";
/// Account publishing the fix projects
pub const DEFAULT_OWNER: &str = "Lyall";
/// State file name, relative to the working directory unless overridden
pub const DEFAULT_STATE_FILE: &str = "installed_fixes.json";

/// Configuration shared by every component
///
/// Nothing reads locations from constants at use sites; tests build a config
/// pointing at a mock server and a temporary state file.
#[derive(Debug, Clone)]
pub struct FixKeeperConfig {
    /// API root, e.g. `https://codeberg.org/api/v1`
    pub api_base: String,
    /// Owner whose repositories form the catalog
    pub owner: String,
    /// Path of the JSON manifest of installed fixes
    pub state_file: PathBuf,
    /// Steam installation roots to scan for libraries
    pub steam_roots: Vec<PathBuf>,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
}

impl FixKeeperConfig {
    pub fn builder() -> FixKeeperConfigBuilder {
        FixKeeperConfigBuilder::new()
    }

    /// Load configuration from `FIXKEEPER_*` environment variables (and `.env`)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(api_base) = lookup("FIXKEEPER_API_BASE") {
            url::Url::parse(&api_base).map_err(|e| FixError::Configuration {
                message: format!("FIXKEEPER_API_BASE is not a valid URL: {}", e),
                field: Some("FIXKEEPER_API_BASE".to_string()),
            })?;
            config.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Some(owner) = lookup("FIXKEEPER_OWNER") {
            config.owner = owner;
        }
        if let Some(state_file) = lookup("FIXKEEPER_STATE_FILE") {
            config.state_file = PathBuf::from(state_file);
        }
        if let Some(roots) = lookup("FIXKEEPER_STEAM_ROOTS") {
            config.steam_roots = std::env::split_paths(&roots).collect();
        }
        if let Some(secs) = lookup("FIXKEEPER_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_number("FIXKEEPER_TIMEOUT_SECS", &secs)?);
        }
        if let Some(retries) = lookup("FIXKEEPER_MAX_RETRIES") {
            config.max_retries = parse_number("FIXKEEPER_MAX_RETRIES", &retries)? as usize;
        }

        Ok(config)
    }

    /// Calculate retry delay for the given attempt using exponential backoff
    pub fn get_retry_delay(&self, attempt: usize) -> Duration {
        let base = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX);
        let cap = u64::try_from(self.max_retry_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(2_u64.pow(attempt.min(16) as u32));
        Duration::from_millis(delay.min(cap))
    }

    /// `GET` endpoint listing the owner's repositories
    pub fn repos_url(&self) -> String {
        format!("{}/users/{}/repos", self.api_base, self.owner)
    }

    /// `GET` endpoint for the latest release of one project
    pub fn latest_release_url(&self, project_id: &str) -> String {
        format!("{}/repos/{}/{}/releases/latest", self.api_base, self.owner, project_id)
    }
}

fn parse_number(field: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| FixError::Configuration {
        message: format!("{} must be a non-negative integer, got '{}'", field, value),
        field: Some(field.to_string()),
    })
}

/// Steam locations checked when nothing else is configured
pub fn default_steam_roots() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    vec![
        home.join(".local/share/Steam"),
        home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"),
        home.join(".steam/steam"),
    ]
}

impl Default for FixKeeperConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: DEFAULT_OWNER.to_string(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            steam_roots: default_steam_roots(),
            user_agent: format!("fixkeeper/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000), // Start with 1 second
            max_retry_delay: Duration::from_secs(60), // Cap at 1 minute
        }
    }
}

/// Builder for [`FixKeeperConfig`]
#[derive(Debug, Clone, Default)]
pub struct FixKeeperConfigBuilder {
    config: FixKeeperConfig,
}

impl FixKeeperConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: FixKeeperConfig) -> Self {
        Self { config }
    }

    pub fn api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.config.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn owner<S: Into<String>>(mut self, owner: S) -> Self {
        self.config.owner = owner.into();
        self
    }

    pub fn state_file<P: Into<PathBuf>>(mut self, state_file: P) -> Self {
        self.config.state_file = state_file.into();
        self
    }

    pub fn steam_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.steam_roots = roots;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.config.retry_delay = retry_delay;
        self
    }

    pub fn build(self) -> FixKeeperConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = FixKeeperConfig::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.owner, "Lyall");
        assert_eq!(config.state_file, PathBuf::from("installed_fixes.json"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = FixKeeperConfig::builder()
            .api_base("http://127.0.0.1:9000/api/v1/")
            .owner("Someone")
            .build();

        assert_eq!(config.repos_url(), "http://127.0.0.1:9000/api/v1/users/Someone/repos");
        assert_eq!(
            config.latest_release_url("GameFix"),
            "http://127.0.0.1:9000/api/v1/repos/Someone/GameFix/releases/latest"
        );
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let config = FixKeeperConfig::default();
        assert_eq!(config.get_retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.get_retry_delay(2), Duration::from_secs(4));
        assert_eq!(config.get_retry_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_delay_saturates_on_huge_values() {
        let mut config = FixKeeperConfig::builder()
            .retry_delay(Duration::from_secs(u64::MAX / 1000))
            .build();
        assert_eq!(config.get_retry_delay(16), Duration::from_secs(60));

        config.max_retry_delay = Duration::MAX;
        assert_eq!(config.get_retry_delay(16), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = FixKeeperConfig::from_lookup(lookup_from(&[
            ("FIXKEEPER_OWNER", "Other"),
            ("FIXKEEPER_STATE_FILE", "/tmp/state.json"),
            ("FIXKEEPER_TIMEOUT_SECS", "5"),
            ("FIXKEEPER_MAX_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.owner, "Other");
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let error = FixKeeperConfig::from_lookup(lookup_from(&[("FIXKEEPER_MAX_RETRIES", "lots")]))
            .unwrap_err();
        match error {
            FixError::Configuration { field, .. } => {
                assert_eq!(field.as_deref(), Some("FIXKEEPER_MAX_RETRIES"));
            }
            other => panic!("Expected Configuration error, got {other:?}"),
        }

        let error = FixKeeperConfig::from_lookup(lookup_from(&[("FIXKEEPER_API_BASE", "not a url")]))
            .unwrap_err();
        assert_eq!(error.category(), "configuration");
    }
}
