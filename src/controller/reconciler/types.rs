//! # Types
//!
//! Core types for the reconciler.

use crate::cluster::{ClusterError, ResourceKind};
use crate::config::OperatorConfig;
use crate::controller::descriptor::DescriptorError;
use crate::controller::manifest::ManifestError;
use crate::controller::templates::RenderError;
use crate::provider::ProviderError;
use std::time::Duration;
use thiserror::Error;

/// Per-descriptor failure, rendered into `errorDescription`
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("can not read `kustomization.yaml`: {0}")]
    Read(#[source] std::io::Error),
    #[error("file with customization must be `kustomization.yaml`, actual: {0}")]
    WrongFileName(String),
    #[error("can not parse `kustomization.yaml`: {0}")]
    Malformed(#[from] DescriptorError),
    #[error("unknown kind of kustomization: `{0}`")]
    UnknownKind(String),
    #[error("not found group or project in git: {0}")]
    Lookup(#[source] ProviderError),
    #[error("not found image tag in git")]
    ReleaseNotFound,
    #[error("not found {kind} template for tier `{tier}`")]
    MissingTemplate { kind: ResourceKind, tier: String },
    #[error("can not apply variables to {kind} template: {source}")]
    Render {
        kind: ResourceKind,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error("can not load image tag from git: {0}")]
    Transport(#[source] ProviderError),
}

impl From<ProviderError> for ReconcileError {
    fn from(error: ProviderError) -> Self {
        if error.is_lookup() {
            ReconcileError::Lookup(error)
        } else {
            ReconcileError::Transport(error)
        }
    }
}

/// How an update of a running workload is carried out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Restart pods on every pass and report `Updated`
    #[default]
    AlwaysRestart,
    /// Skip the restart and report `NotChanged` when every image already runs the resolved tag
    RestartOnTagChange,
}

impl std::str::FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always-restart" | "always" => Ok(UpdatePolicy::AlwaysRestart),
            "restart-on-tag-change" | "on-tag-change" => Ok(UpdatePolicy::RestartOnTagChange),
            other => Err(format!(
                "unknown update policy `{other}`, expected `always-restart` or `restart-on-tag-change`"
            )),
        }
    }
}

/// Tunables of the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    pub update_policy: UpdatePolicy,
    /// Wait after a removal before continuing
    pub removal_settle_delay: Duration,
    /// Label key of the pod selector `<key>=<name>` used on restart
    pub restart_label_key: String,
    pub pod_restart_grace_secs: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::from(&OperatorConfig::default())
    }
}

impl From<&OperatorConfig> for ReconcilePolicy {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            update_policy: config.update_policy,
            removal_settle_delay: config.removal_settle_delay(),
            restart_label_key: config.restart_label_key.clone(),
            pod_restart_grace_secs: config.pod_restart_grace_secs,
        }
    }
}
