use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

pub const ENV_BASE_URL: &str = "REPORT_PORTAL_URL";
pub const ENV_TIMEOUT_SECS: &str = "REPORT_PORTAL_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("citizen-report/{}", env!("CARGO_PKG_VERSION"))
}

/// Connection settings for the forms backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Parses a JSON config document; blank input yields the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ClientError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(ClientError::ConfigParse)
    }

    /// Loads the optional config file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|source| {
                    ClientError::ConfigRead {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Self::from_json_str(&contents)?
            }
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `REPORT_PORTAL_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|value| !value.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs =
                raw.trim()
                    .parse::<u64>()
                    .map_err(|err| ClientError::ConfigValue {
                        key: ENV_TIMEOUT_SECS,
                        reason: err.to_string(),
                    })?;
        }
        Ok(self)
    }

    /// Base URL normalized to end in `/` so relative joins keep its path.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|source| ClientError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(ClientError::OpaqueBaseUrl(self.base_url.clone()));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_document_uses_defaults() {
        let config = ClientConfig::from_json_str("  ").expect("config");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config =
            ClientConfig::from_json_str(r#"{ "base_url": "https://lgu.example/api" }"#).unwrap();
        assert_eq!(config.base_url, "https://lgu.example/api");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://lgu.example/api/"
        );
    }

    #[test]
    fn load_reads_timeout_from_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("client.json");
        fs::write(&path, r#"{ "timeout_secs": 90 }"#).unwrap();
        let config = ClientConfig::load(Some(&path)).expect("config");
        assert_eq!(config.timeout_secs, 90);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ClientConfig::load(Some(&missing)),
            Err(ClientError::ConfigRead { .. })
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = ClientConfig::default()
            .with_overrides(|key| match key {
                ENV_BASE_URL => Some("https://portal.example/".into()),
                ENV_TIMEOUT_SECS => Some("5".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.base_url, "https://portal.example/");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn bad_timeout_override_is_rejected() {
        let err = ClientConfig::default()
            .with_overrides(|key| (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ConfigValue {
                key: ENV_TIMEOUT_SECS,
                ..
            }
        ));
    }

    #[test]
    fn opaque_base_url_is_rejected() {
        let config = ClientConfig {
            base_url: "mailto:help@lgu.example".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.base_url(),
            Err(ClientError::OpaqueBaseUrl(_))
        ));
    }
}
