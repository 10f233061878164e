//! Configuration for a test client
//!
//! Settings are resolved from:
//! 1. Environment variables (highest priority)
//! 2. Configuration file (TOML format)
//! 3. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stratus_common::ApiKeyPair;

/// Top-level test client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestClientConfig {
    /// Management server the tests talk to
    pub management: ManagementServerConfig,
    /// Database of the management server (optional, read-only)
    pub database: Option<DatabaseConfig>,
    /// Upper bound for one async job, and for one job-runner batch
    pub async_timeout_secs: u64,
    /// Delay between two `queryAsyncJobResult` polls
    pub poll_interval_ms: u64,
    /// Worker count used when a batch does not name one
    pub default_worker_threads: usize,
    /// Hypervisor the suite targets, handed to every derived client
    pub hypervisor: Option<String>,
}

/// Management server endpoint and bootstrap credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementServerConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub username: String,
    pub password: String,
    /// Without a key pair requests go unsigned to the integration port
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub request_timeout_secs: u64,
}

/// Database server of the management server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for TestClientConfig {
    fn default() -> Self {
        Self {
            management: ManagementServerConfig::default(),
            database: None,
            async_timeout_secs: 3600,
            poll_interval_ms: 1000,
            default_worker_threads: 10,
            hypervisor: None,
        }
    }
}

impl Default for ManagementServerConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 8096,
            path: "/client/api".to_string(),
            username: "admin".to_string(),
            password: "password".to_string(),
            api_key: None,
            secret_key: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "cloud".to_string(),
            password: "cloud".to_string(),
            name: "cloud".to_string(),
        }
    }
}

impl ManagementServerConfig {
    /// Full URL of the API endpoint
    pub fn endpoint(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, path)
    }

    /// Bootstrap key pair, if both halves are configured
    pub fn key_pair(&self) -> Option<ApiKeyPair> {
        match (&self.api_key, &self.secret_key) {
            (Some(key), Some(secret)) => Some(ApiKeyPair::new(key.clone(), secret.clone())),
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.name
        )
    }
}

impl TestClientConfig {
    /// Load configuration from environment variables and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("STRATUS_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("./stratus.toml")),
            Some(PathBuf::from("/etc/stratus/config.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Management server
        if let Some(scheme) = lookup("STRATUS_MGMT_SCHEME") {
            self.management.scheme = scheme;
        }
        if let Some(host) = lookup("STRATUS_MGMT_HOST") {
            self.management.host = host;
        }
        if let Some(port) = lookup("STRATUS_MGMT_PORT") {
            if let Ok(port) = port.parse() {
                self.management.port = port;
            }
        }
        if let Some(path) = lookup("STRATUS_MGMT_PATH") {
            self.management.path = path;
        }
        if let Some(user) = lookup("STRATUS_MGMT_USER") {
            self.management.username = user;
        }
        if let Some(password) = lookup("STRATUS_MGMT_PASSWORD") {
            self.management.password = password;
        }
        if let Some(key) = lookup("STRATUS_API_KEY") {
            self.management.api_key = Some(key);
        }
        if let Some(secret) = lookup("STRATUS_SECRET_KEY") {
            self.management.secret_key = Some(secret);
        }

        // Database
        if let Some(host) = lookup("STRATUS_DB_HOST") {
            self.database.get_or_insert_with(DatabaseConfig::default).host = host;
        }
        if let Some(port) = lookup("STRATUS_DB_PORT") {
            if let Ok(port) = port.parse() {
                self.database.get_or_insert_with(DatabaseConfig::default).port = port;
            }
        }
        if let Some(user) = lookup("STRATUS_DB_USER") {
            self.database.get_or_insert_with(DatabaseConfig::default).user = user;
        }
        if let Some(password) = lookup("STRATUS_DB_PASSWORD") {
            self.database.get_or_insert_with(DatabaseConfig::default).password = password;
        }
        if let Some(name) = lookup("STRATUS_DB_NAME") {
            self.database.get_or_insert_with(DatabaseConfig::default).name = name;
        }

        // Jobs
        if let Some(timeout) = lookup("STRATUS_ASYNC_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                self.async_timeout_secs = timeout;
            }
        }
        if let Some(workers) = lookup("STRATUS_WORKER_THREADS") {
            if let Ok(workers) = workers.parse() {
                self.default_worker_threads = workers;
            }
        }
        if let Some(hypervisor) = lookup("STRATUS_HYPERVISOR") {
            self.hypervisor = Some(hypervisor);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.management.host.is_empty() {
            return Err(ConfigError::Validation("management host is empty".to_string()));
        }
        if self.management.port == 0 {
            return Err(ConfigError::Validation("management port cannot be 0".to_string()));
        }
        if !matches!(self.management.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "unsupported scheme '{}'",
                self.management.scheme
            )));
        }
        if self.management.api_key.is_some() != self.management.secret_key.is_some() {
            return Err(ConfigError::Validation(
                "api_key and secret_key must be set together".to_string(),
            ));
        }
        if self.management.request_timeout_secs == 0 || self.async_timeout_secs == 0 {
            return Err(ConfigError::Validation("timeouts must be positive".to_string()));
        }
        if self.default_worker_threads == 0 {
            return Err(ConfigError::Validation(
                "default_worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn async_timeout(&self) -> Duration {
        Duration::from_secs(self.async_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
