//! # Descriptor
//!
//! A `kustomization.yaml` describing one deployable workload.
//!
//! ```yaml
//! tier: api
//! ns: billing
//! name: billing-api
//! kind: deployment
//! only-for: prod
//! service:
//!   timeout: 30s
//!   service-template: http
//! repository:
//!   provider: github.com
//!   group: acme
//!   project: billing-api
//! env:
//!   - name: LOG_LEVEL
//!     value: info
//!   - name: DB_PASSWORD
//!     valueFrom:
//!       secretKeyRef: { name: billing-db, key: password }
//! ```

use crate::api::{ServerMode, ServiceId};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("{0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Descriptor {
    /// Template variant, empty for the default template
    #[serde(default)]
    pub tier: String,
    #[serde(default, rename = "ns")]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    /// `cronjob` or `deployment`, validated by the reconciler
    #[serde(default)]
    pub kind: String,
    #[serde(default, rename = "only-for")]
    pub environment_scope: EnvironmentScope,
    #[serde(default)]
    pub service: Option<ServiceDescriptor>,
    #[serde(default)]
    pub repository: Repository,
    /// Cron expression, only used by cronjobs
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub env: Vec<EnvVarSpec>,
}

/// Where the workload should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Option<String>")]
pub enum EnvironmentScope {
    #[default]
    All,
    Devel,
    Prod,
}

impl TryFrom<Option<String>> for EnvironmentScope {
    type Error = String;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value.as_deref().map(str::trim) {
            None | Some("" | "all") => Ok(EnvironmentScope::All),
            Some("devel") => Ok(EnvironmentScope::Devel),
            Some("prod") => Ok(EnvironmentScope::Prod),
            Some(other) => Err(format!(
                "only-for must be one of `all`, `devel`, `prod`, got `{other}`"
            )),
        }
    }
}

impl EnvironmentScope {
    /// The workload must not exist when the operator runs in `mode`
    #[must_use]
    pub fn disables(self, mode: ServerMode) -> bool {
        match self {
            EnvironmentScope::All => false,
            EnvironmentScope::Devel => mode != ServerMode::Development,
            EnvironmentScope::Prod => mode != ServerMode::Production,
        }
    }
}

/// Companion service of a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceDescriptor {
    #[serde(default)]
    pub timeout: String,
    /// Tier of the service template
    #[serde(default)]
    pub service_template: String,
    #[serde(default, alias = "dxeployment-template")]
    pub deployment_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// Provider id as configured under `providers`
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub project: String,
}

/// Reference to a key of a Secret or ConfigMap
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyRef {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Literal(String),
    SecretKey(KeyRef),
    ConfigMapKey(KeyRef),
}

/// Environment variable injected into the workload's first container
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEnvVar")]
pub struct EnvVarSpec {
    pub name: String,
    pub value: EnvValue,
}

impl EnvVarSpec {
    #[must_use]
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: EnvValue::Literal(value.into()),
        }
    }
}

#[derive(Deserialize)]
struct RawEnvVar {
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default, rename = "valueFrom")]
    value_from: Option<RawEnvVarSource>,
}

#[derive(Deserialize)]
struct RawEnvVarSource {
    #[serde(default, rename = "configMapKeyRef")]
    config_map_key_ref: Option<KeyRef>,
    #[serde(default, rename = "secretKeyRef")]
    secret_key_ref: Option<KeyRef>,
}

impl TryFrom<RawEnvVar> for EnvVarSpec {
    type Error = String;

    fn try_from(raw: RawEnvVar) -> Result<Self, Self::Error> {
        let value = match (raw.value, raw.value_from) {
            (Some(value), None) => EnvValue::Literal(value),
            (None, Some(source)) => match (source.secret_key_ref, source.config_map_key_ref) {
                (Some(secret), None) => EnvValue::SecretKey(secret),
                (None, Some(config_map)) => EnvValue::ConfigMapKey(config_map),
                _ => {
                    return Err(format!(
                        "env `{}`: valueFrom needs exactly one of secretKeyRef, configMapKeyRef",
                        raw.name
                    ))
                }
            },
            _ => {
                return Err(format!(
                    "env `{}`: exactly one of value, valueFrom must be set",
                    raw.name
                ))
            }
        };
        Ok(Self {
            name: raw.name,
            value,
        })
    }
}

impl Descriptor {
    /// Decode a descriptor from YAML
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Malformed`] when the YAML can not be decoded or the descriptor fails validation.
    pub fn parse(content: &[u8]) -> Result<Self, DescriptorError> {
        serde_yaml::from_slice(content).map_err(|e| DescriptorError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        ServiceId {
            group: self.repository.group.clone(),
            package: self.name.clone(),
            kind: self.kind.clone(),
        }
    }

    #[must_use]
    pub fn disabled_in(&self, mode: ServerMode) -> bool {
        self.environment_scope.disables(mode)
    }
}
