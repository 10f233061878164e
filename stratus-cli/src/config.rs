//! CLI configuration loading

use anyhow::{Context, Result};
use std::path::Path;
use stratus_client::{TestClient, TestClientConfig};
use tracing::debug;

/// Load the test client configuration
///
/// An explicit path wins; otherwise the usual search applies. Environment
/// overrides are applied either way.
pub fn load(path: Option<&Path>) -> Result<TestClientConfig> {
    let config = match path {
        Some(path) => {
            let mut config = TestClientConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => TestClientConfig::load().context("Failed to load config")?,
    };

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load the configuration and open a session with it
pub async fn connect(path: Option<&Path>) -> Result<TestClient> {
    let config = load(path)?;
    let endpoint = config.management.endpoint();
    debug!("Using management server {}", endpoint);
    TestClient::connect(config)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
async_timeout_secs = 120

[management]
host = "mgmt.example.test"
port = 8080
"#
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.async_timeout_secs, 120);
        assert_eq!(config.management.port, 8080);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
