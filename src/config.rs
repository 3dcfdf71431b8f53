//! Configuration management for the status board

use crate::errors::{Result, StatusError};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";
pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org/2.0";

/// A single endpoint to probe for liveness
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
}

fn default_expected_status() -> u16 {
    200
}

impl EndpointConfig {
    pub fn new(title: &str, url: &str, description: &str, expected_status: u16) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            expected_status,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// Account owning the monitored repositories
    pub account: String,

    /// OAuth consumer key
    pub consumer_key: String,

    /// OAuth consumer secret
    pub consumer_secret: String,

    /// Repositories whose commits are aggregated, in polling order
    pub repositories: Vec<String>,

    /// OAuth2 token endpoint
    pub token_url: String,

    /// REST API base, without trailing slash
    pub api_base_url: String,

    /// Period of the commit aggregation loop
    pub commit_poll_interval: Duration,

    /// Pause between two repositories within one aggregation cycle
    pub repository_pause: Duration,

    /// Period of the endpoint monitor loop
    pub monitor_interval: Duration,

    /// Connect timeout for every outbound request
    pub connect_timeout: Duration,

    /// Read timeout for every outbound request
    pub read_timeout: Duration,

    /// Endpoints probed by the monitor
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            repositories: Vec::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            commit_poll_interval: Duration::from_secs(24 * 60 * 60),
            repository_pause: Duration::from_millis(5000),
            monitor_interval: Duration::from_secs(5 * 60),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            endpoints: default_endpoints(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("account", &self.account)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("repositories", &self.repositories)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("commit_poll_interval", &self.commit_poll_interval)
            .field("repository_pause", &self.repository_pause)
            .field("monitor_interval", &self.monitor_interval)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig::new("Website", "https://iungo.network", "", 200),
        EndpointConfig::new("APP", "https://app.iungo.network", "Service gateway", 200),
        EndpointConfig::new("API", "https://api.iungo.network", "", 200),
    ]
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(account) = lookup("BITBUCKET_ACCOUNT") {
            config.account = account.trim().to_string();
        }

        if let Some(key) = lookup("BITBUCKET_KEY") {
            config.consumer_key = key.trim().to_string();
        }

        if let Some(secret) = lookup("BITBUCKET_SECRET") {
            config.consumer_secret = secret.trim().to_string();
        }

        if let Some(repositories) = lookup("BITBUCKET_REPOSITORIES") {
            config.repositories = parse_repository_list(&repositories);
        }

        if let Some(token_url) = lookup("BITBUCKET_TOKEN_URL") {
            config.token_url = token_url;
        }

        if let Some(api_url) = lookup("BITBUCKET_API_URL") {
            config.api_base_url = api_url.trim_end_matches('/').to_string();
        }

        if let Some(seconds) = lookup("COMMIT_POLL_INTERVAL_SECONDS").and_then(|v| v.parse().ok()) {
            config.commit_poll_interval = Duration::from_secs(seconds);
        }

        if let Some(ms) = lookup("REPOSITORY_PAUSE_MS").and_then(|v| v.parse().ok()) {
            config.repository_pause = Duration::from_millis(ms);
        }

        if let Some(seconds) = lookup("MONITOR_INTERVAL_SECONDS").and_then(|v| v.parse().ok()) {
            config.monitor_interval = Duration::from_secs(seconds);
        }

        if let Some(seconds) = lookup("HTTP_CONNECT_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.connect_timeout = Duration::from_secs(seconds);
        }

        if let Some(seconds) = lookup("HTTP_READ_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.read_timeout = Duration::from_secs(seconds);
        }

        config
    }

    /// Replace the monitored endpoints with the JSON list stored at `path`
    pub fn load_endpoints_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let endpoints: Vec<EndpointConfig> = serde_json::from_str(&raw)?;
        self.endpoints = endpoints;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.repositories.is_empty() {
            if self.account.is_empty() {
                return Err("account cannot be empty when repositories are configured".to_string());
            }

            if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
                return Err("consumer key and secret are required when repositories are configured".to_string());
            }

            if !is_path_segment(&self.account) {
                return Err(format!("account '{}' is not a valid path segment", self.account));
            }

            if let Some(repository) = self.repositories.iter().find(|r| !is_path_segment(r)) {
                return Err(format!("repository '{}' is not a valid path segment", repository));
            }
        }

        if self.token_url.is_empty() {
            return Err("token_url cannot be empty".to_string());
        }

        if self.api_base_url.is_empty() {
            return Err("api_base_url cannot be empty".to_string());
        }

        if self.commit_poll_interval.is_zero() || self.monitor_interval.is_zero() {
            return Err("poll intervals must be greater than 0".to_string());
        }

        for endpoint in &self.endpoints {
            if endpoint.url.is_empty() {
                return Err(format!("endpoint '{}' has an empty url", endpoint.title));
            }

            if !(100..=599).contains(&endpoint.expected_status) {
                return Err(format!(
                    "endpoint '{}' expects invalid status {}",
                    endpoint.title, endpoint.expected_status
                ));
            }
        }

        Ok(())
    }

    /// Validate, mapping failures into the crate error
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(StatusError::Config)
    }
}

/// True if `name` can be placed in a URL path as a single segment unchanged
pub fn is_path_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

fn parse_repository_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(|_| None);

        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.commit_poll_interval, Duration::from_secs(86400));
        assert_eq!(config.monitor_interval, Duration::from_secs(300));
        assert_eq!(config.repository_pause, Duration::from_millis(5000));
        assert_eq!(config.endpoints.len(), 3);
        assert_eq!(config.endpoints[1].description, "Service gateway");
        assert!(config.repositories.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_repository_list_is_trimmed() {
        let config = Config::from_vars(lookup_from(&[
            ("BITBUCKET_ACCOUNT", "iungo"),
            ("BITBUCKET_KEY", "key"),
            ("BITBUCKET_SECRET", "secret"),
            ("BITBUCKET_REPOSITORIES", " core , web,, gateway "),
            ("BITBUCKET_API_URL", "http://localhost:9000/2.0/"),
            ("MONITOR_INTERVAL_SECONDS", "60"),
            ("REPOSITORY_PAUSE_MS", "not-a-number"),
        ]));

        assert_eq!(config.repositories, vec!["core", "web", "gateway"]);
        assert_eq!(config.api_base_url, "http://localhost:9000/2.0");
        assert_eq!(config.monitor_interval, Duration::from_secs(60));
        assert_eq!(config.repository_pause, Duration::from_millis(5000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_credentials_for_repositories() {
        let config = Config::from_vars(lookup_from(&[
            ("BITBUCKET_ACCOUNT", "iungo"),
            ("BITBUCKET_REPOSITORIES", "core"),
        ]));

        let err = config.validate().unwrap_err();
        assert!(err.contains("consumer key"));
        assert!(matches!(config.ensure_valid(), Err(StatusError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_repository_names_that_change_the_path() {
        for name in ["team/other", "core?page=2", "core#frag", "..", "my repo"] {
            let config = Config::from_vars(lookup_from(&[
                ("BITBUCKET_ACCOUNT", "iungo"),
                ("BITBUCKET_KEY", "key"),
                ("BITBUCKET_SECRET", "secret"),
                ("BITBUCKET_REPOSITORIES", name),
            ]));

            let err = config.validate().unwrap_err();
            assert!(err.contains("not a valid path segment"), "{}: {}", name, err);
        }
    }

    #[test]
    fn test_validation_rejects_account_that_changes_the_path() {
        let config = Config::from_vars(lookup_from(&[
            ("BITBUCKET_ACCOUNT", "iungo/../admin"),
            ("BITBUCKET_KEY", "key"),
            ("BITBUCKET_SECRET", "secret"),
            ("BITBUCKET_REPOSITORIES", "core"),
        ]));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_segment() {
        assert!(is_path_segment("status-board_v2.0"));
        assert!(!is_path_segment(""));
        assert!(!is_path_segment("a/b"));
        assert!(!is_path_segment("a%2Fb"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let mut config = Config::default();
        config.consumer_secret = "hunter2".to_string();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_validation_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.endpoints = vec![EndpointConfig::new("Broken", "https://example.org", "", 42)];
        assert!(config.validate().is_err());

        config.endpoints = vec![EndpointConfig::new("Empty", "", "", 200)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_endpoints_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"url": "https://status.example.org", "title": "Status"}},
                {{"url": "https://example.org/login", "title": "Login", "description": "SSO", "expected_status": 302}}
            ]"#
        )
        .unwrap();

        let mut config = Config::default();
        config.load_endpoints_file(file.path()).unwrap();

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].expected_status, 200);
        assert_eq!(config.endpoints[0].description, "");
        assert_eq!(config.endpoints[1].expected_status, 302);
    }

    #[test]
    fn test_load_endpoints_file_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let mut config = Config::default();
        let result = config.load_endpoints_file(file.path());

        assert!(matches!(result, Err(StatusError::Json(_))));
        assert_eq!(config.endpoints.len(), 3);
    }
}
