//! # Release Providers
//!
//! Release-hosting backends queried for the latest deployable image tag.
//!
//! Every backend implements [`ReleaseSource`]. Concrete clients are built once
//! from the deploy config into a [`ReleaseProvider`] and stored in an immutable
//! [`ProviderRegistry`] keyed by the provider id descriptors reference.

use crate::api::ServerMode;
use crate::config::ProviderSettings;
use crate::constants::DEFAULT_GITHUB_API_URL;
use crate::observability::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

// Common utilities shared across providers
pub mod common;

// Provider implementations
pub mod github;
pub mod gitlab;

pub use common::ClientOptions;
pub use github::GitHubClient;
pub use gitlab::GitLabClient;

/// Latest published release of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub image_tag: String,
    /// RFC 2822 display string, empty when the provider has no date
    pub release_date: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("group `{0}` not found")]
    GroupNotFound(String),
    #[error("project `{project}` not found in group `{group}`")]
    ProjectNotFound { group: String, project: String },
    #[error("unknown release provider `{0}`")]
    UnknownProvider(String),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ProviderError {
    /// Group, project or provider could not be resolved
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            ProviderError::GroupNotFound(_)
                | ProviderError::ProjectNotFound { .. }
                | ProviderError::UnknownProvider(_)
        )
    }
}

/// Release tag filtering by server mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagFilter {
    /// First release wins regardless of its tag
    #[default]
    Disabled,
    /// Only tags ending with the mode (`devel` / `prod`) are considered
    ModeSuffix,
}

impl TagFilter {
    #[must_use]
    pub fn accepts(self, tag: &str, mode: ServerMode) -> bool {
        match self {
            TagFilter::Disabled => true,
            TagFilter::ModeSuffix => tag.ends_with(mode.as_str()),
        }
    }
}

impl std::str::FromStr for TagFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "none" | "off" => Ok(TagFilter::Disabled),
            "mode-suffix" | "suffix" => Ok(TagFilter::ModeSuffix),
            other => Err(format!(
                "unknown tag filter `{other}`, expected `disabled` or `mode-suffix`"
            )),
        }
    }
}

/// A backend able to resolve the latest release of a project
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Display name reported in service results
    fn provider_name(&self) -> &str;

    /// Latest viable release of `group/project`
    ///
    /// `Ok(None)` means the project exists but has no matching release.
    async fn resolve_latest_release(
        &self,
        group: &str,
        project: &str,
        mode: ServerMode,
    ) -> Result<Option<ReleaseInfo>, ProviderError>;
}

/// Concrete provider selected by the `api-type` of its config entry
#[derive(Debug)]
pub enum ReleaseProvider {
    GitHub(GitHubClient),
    GitLab(GitLabClient),
}

impl ReleaseProvider {
    /// Build the client for one config entry
    ///
    /// Returns `Ok(None)` for unsupported api types so startup can skip them.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] when the HTTP client of a supported provider can not be built.
    pub fn from_settings(
        id: &str,
        settings: &ProviderSettings,
        options: &ClientOptions,
    ) -> Result<Option<Self>, ProviderError> {
        match settings.api_type.trim().to_ascii_lowercase().as_str() {
            "github" => {
                let base_url = if settings.url.is_empty() {
                    DEFAULT_GITHUB_API_URL.to_string()
                } else {
                    settings.url.clone()
                };
                info!("Connecting to GitHub provider {} at {}", id, base_url);
                let client = GitHubClient::new(
                    base_url,
                    &settings.secret_token,
                    options,
                    settings.insecure_skip_tls_verify,
                )?;
                Ok(Some(ReleaseProvider::GitHub(client)))
            }
            "gitlab" => {
                let base_url = if settings.url.is_empty() {
                    format!("https://{id}/api/v4")
                } else {
                    settings.url.clone()
                };
                info!("Connecting to GitLab provider {} at {}", id, base_url);
                let client = GitLabClient::new(
                    base_url,
                    &settings.secret_token,
                    options,
                    settings.insecure_skip_tls_verify,
                )?;
                Ok(Some(ReleaseProvider::GitLab(client)))
            }
            other => {
                warn!("Unknown provider type `{}` for provider {}, skipping", other, id);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ReleaseSource for ReleaseProvider {
    fn provider_name(&self) -> &str {
        match self {
            ReleaseProvider::GitHub(client) => client.provider_name(),
            ReleaseProvider::GitLab(client) => client.provider_name(),
        }
    }

    async fn resolve_latest_release(
        &self,
        group: &str,
        project: &str,
        mode: ServerMode,
    ) -> Result<Option<ReleaseInfo>, ProviderError> {
        let start = Instant::now();
        let result = match self {
            ReleaseProvider::GitHub(client) => {
                client.resolve_latest_release(group, project, mode).await
            }
            ReleaseProvider::GitLab(client) => {
                client.resolve_latest_release(group, project, mode).await
            }
        };
        metrics::record_release_lookup(
            self.provider_name(),
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        result
    }
}

/// Immutable map `provider id -> release source`
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    sources: HashMap<String, Arc<dyn ReleaseSource>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.sources.keys().collect();
        ids.sort();
        f.debug_struct("ProviderRegistry").field("ids", &ids).finish()
    }
}

impl ProviderRegistry {
    /// Build every supported provider from the config, skipping unknown api types
    ///
    /// # Errors
    ///
    /// Returns the first client construction error, see [`ReleaseProvider::from_settings`].
    pub fn from_config(
        providers: &BTreeMap<String, ProviderSettings>,
        options: &ClientOptions,
    ) -> Result<Self, ProviderError> {
        let mut registry = Self::default();
        for (id, settings) in providers {
            if let Some(provider) = ReleaseProvider::from_settings(id, settings, options)? {
                registry = registry.with_source(id.clone(), Arc::new(provider));
            }
        }
        info!("{} release providers registered", registry.len());
        Ok(registry)
    }

    #[must_use]
    pub fn with_source(mut self, id: impl Into<String>, source: Arc<dyn ReleaseSource>) -> Self {
        self.sources.insert(id.into(), source);
        self
    }

    /// Source registered under `id`
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownProvider`] when nothing is registered under `id`.
    pub fn get(&self, id: &str) -> Result<Arc<dyn ReleaseSource>, ProviderError> {
        self.sources
            .get(id)
            .map(Arc::clone)
            .ok_or_else(|| ProviderError::UnknownProvider(id.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
