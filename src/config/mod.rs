//! # Configuration
//!
//! The deploy config file (YAML) and runtime tuning from environment variables.
//!
//! ```yaml
//! server-port: 8443
//! certs:
//!   cert-file: /etc/deploy/tls/tls.crt
//!   key-file: /etc/deploy/tls/tls.key
//! templates: /etc/deploy/templates
//! kustomizations: /etc/deploy/kustomizations
//! providers:
//!   github.com:
//!     api-type: github
//!     secret-token: ghp_xxx
//!   gitlab.example.com:
//!     api-type: gitlab
//!     secret-token: glpat-xxx
//!     insecure-skip-tls-verify: true
//! ```

pub mod runtime;

pub use runtime::OperatorConfig;

use crate::constants::DEFAULT_SERVER_PORT;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Deploy config file contents
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeployConfig {
    /// Listen port of the deploy API
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// TLS certificate and key for the deploy API
    #[serde(default)]
    pub certs: CertsConfig,
    /// Directory holding `<kind>[-<tier>].yaml` manifest templates
    pub templates: PathBuf,
    /// Root directory of the kustomization descriptors
    pub kustomizations: PathBuf,
    /// Release providers keyed by the id descriptors reference in `repository.provider`
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CertsConfig {
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

/// Connection settings of one release provider
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderSettings {
    /// API base URL, empty means the provider default
    #[serde(default)]
    pub url: String,
    /// `github` or `gitlab`; anything else is skipped at startup
    pub api_type: String,
    #[serde(default)]
    pub secret_token: String,
    /// Disables certificate verification (self-hosted GitLab with private CAs)
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("url", &self.url)
            .field("api_type", &self.api_type)
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish_non_exhaustive()
    }
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

impl DeployConfig {
    /// Load and validate the config file at `path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file can not be read, parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.templates.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("`templates` must not be empty".to_string()));
        }
        if self.kustomizations.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "`kustomizations` must not be empty".to_string(),
            ));
        }
        if self.certs.cert_file.is_some() != self.certs.key_file.is_some() {
            return Err(ConfigError::Invalid(
                "`certs.cert-file` and `certs.key-file` must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Certificate and key paths when TLS is configured
    #[must_use]
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.certs.cert_file, &self.certs.key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r"
server-port: 9443
certs:
  cert-file: /tls/tls.crt
  key-file: /tls/tls.key
templates: /etc/deploy/templates
kustomizations: /etc/deploy/kustomizations
providers:
  github.com:
    api-type: github
    secret-token: token-a
  gitlab.example.com:
    api-type: gitlab
    url: https://gitlab.example.com/api/v4
    secret-token: token-b
    insecure-skip-tls-verify: true
",
        );

        let config = DeployConfig::load(file.path()).unwrap();
        assert_eq!(config.server_port, 9443);
        assert_eq!(config.templates, PathBuf::from("/etc/deploy/templates"));
        assert_eq!(config.providers.len(), 2);
        let gitlab = &config.providers["gitlab.example.com"];
        assert_eq!(gitlab.api_type, "gitlab");
        assert!(gitlab.insecure_skip_tls_verify);
        assert!(!config.providers["github.com"].insecure_skip_tls_verify);
        let (cert, key) = config.tls_files().unwrap();
        assert_eq!(cert, Path::new("/tls/tls.crt"));
        assert_eq!(key, Path::new("/tls/tls.key"));
    }

    #[test]
    fn test_defaults_apply() {
        let file = write_config("templates: /t\nkustomizations: /k\n");
        let config = DeployConfig::load(file.path()).unwrap();
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
        assert!(config.providers.is_empty());
        assert!(config.tls_files().is_none());
    }

    #[test]
    fn test_half_configured_tls_is_invalid() {
        let file = write_config("templates: /t\nkustomizations: /k\ncerts:\n  cert-file: /c\n");
        let err = DeployConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = DeployConfig::load(Path::new("/nonexistent/deploy/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let file = write_config("templates: [unterminated\n");
        let err = DeployConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_debug_hides_secret_token() {
        let file = write_config(
            "templates: /t\nkustomizations: /k\nproviders:\n  github.com:\n    api-type: github\n    secret-token: super-secret\n",
        );
        let config = DeployConfig::load(file.path()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
