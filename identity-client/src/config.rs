use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ClientError;

pub const SECRET_FILE: &str = "secret";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of identity-service
    #[serde(default = "default_server")]
    pub server: String,
    /// Project used when a command does not name one
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub config_dir: PathBuf,
}

fn default_server() -> String {
    "http://localhost:18443".to_string()
}

fn default_project() -> String {
    "master".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl ClientConfig {
    /// `<user config dir>/identity`, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("identity"))
    }

    pub fn load() -> Result<Self, ClientError> {
        let dir = Self::default_dir().ok_or_else(|| {
            ClientError::Unexpected(anyhow::anyhow!("no user configuration directory"))
        })?;
        Self::load_from(&dir)
    }

    /// Reads `config.yaml` in `dir` when present, then `IDCTL__*` variables.
    pub fn load_from(dir: &Path) -> Result<Self, ClientError> {
        let cfg = Cfg::builder()
            .add_source(File::from(dir.join("config.yaml")).required(false))
            .add_source(Environment::with_prefix("IDCTL").separator("__"))
            .build()?;

        let mut config: ClientConfig = cfg.try_deserialize()?;
        config.server = config.server.trim_end_matches('/').to_string();
        config.config_dir = dir.to_path_buf();
        Ok(config)
    }

    pub fn with_server(dir: &Path, server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            project: default_project(),
            timeout_secs: default_timeout_secs(),
            config_dir: dir.to_path_buf(),
        }
    }

    pub fn secret_path(&self) -> PathBuf {
        self.config_dir.join(SECRET_FILE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from(dir.path()).unwrap();

        assert_eq!(config.project, "master");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.secret_path(), dir.path().join("secret"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "server: https://id.example.com/\nproject: acme\ntimeout_secs: 3\n",
        )
        .unwrap();

        let config = ClientConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.server, "https://id.example.com");
        assert_eq!(config.project, "acme");
        assert_eq!(config.timeout_secs, 3);
    }
}
