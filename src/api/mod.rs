//! # Deploy API
//!
//! Wire types of the deploy operation. All JSON is camelCase.
//!
//! ```json
//! { "path": "billing", "recreate": false, "mode": "Production" }
//! ```
//!
//! is answered with either
//!
//! ```json
//! { "services": [ { "path": "billing/api", "serviceId": { ... }, "provider": "GitHub", "action": "Updated" } ] }
//! ```
//!
//! or a top-level failure `{ "errorDescription": "..." }`.

use crate::provider::ReleaseInfo;
use serde::{Deserialize, Serialize};

/// Environment the operator deploys for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerMode {
    Development,
    Production,
}

impl ServerMode {
    /// Short name used in descriptor scopes, tag suffixes and `APP_SERVER_MODE`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServerMode::Development => "devel",
            ServerMode::Production => "prod",
        }
    }
}

impl std::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    /// Sub-directory of the kustomization root to walk, the whole root when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Force remove-then-create of every found workload
    #[serde(default)]
    pub recreate: bool,
    pub mode: ServerMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeployResponse {
    Services(Vec<ServiceResult>),
    ErrorDescription(String),
}

/// Action taken for one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    NotChanged,
    Created,
    Updated,
    Removed,
    Recreated,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::NotChanged => "not_changed",
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Removed => "removed",
            Action::Recreated => "recreated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceId {
    pub group: String,
    pub package: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Action(Action),
    ErrorDescription(String),
}

/// Result of reconciling one descriptor file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResult {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseInfo>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ServiceResult {
    #[must_use]
    pub fn action(&self) -> Option<Action> {
        match &self.outcome {
            Outcome::Action(action) => Some(*action),
            Outcome::ErrorDescription(_) => None,
        }
    }

    #[must_use]
    pub fn error_description(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Action(_) => None,
            Outcome::ErrorDescription(description) => Some(description),
        }
    }
}
