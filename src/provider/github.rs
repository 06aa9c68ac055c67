//! # GitHub Releases
//!
//! Resolves the latest release through the GitHub REST API:
//!
//! 1. `GET /orgs/{group}` for the organization login
//! 2. `GET /repos/{login}/{project}` for the repository name
//! 3. `GET /repos/{login}/{repo}/releases?per_page=3&page=1`

use super::common::{build_http_client, fetch_json, select_release, ClientOptions};
use super::{ProviderError, ReleaseInfo, ReleaseSource, TagFilter};
use crate::api::ServerMode;
use crate::constants::RELEASE_LOOKAHEAD;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    published_at: Option<String>,
}

pub struct GitHubClient {
    http_client: Client,
    base_url: String,
    token: String,
    tag_filter: TagFilter,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("tag_filter", &self.tag_filter)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Build a client for the API at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] when the HTTP client can not be built.
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        options: &ClientOptions,
        insecure_skip_tls_verify: bool,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = build_http_client(&base_url, options, insecure_skip_tls_verify)?;
        Ok(Self {
            http_client,
            base_url,
            token: token.to_string(),
            tag_filter: options.tag_filter,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn make_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http_client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }
        request
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    fn provider_name(&self) -> &str {
        "GitHub"
    }

    async fn resolve_latest_release(
        &self,
        group: &str,
        project: &str,
        mode: ServerMode,
    ) -> Result<Option<ReleaseInfo>, ProviderError> {
        let url = format!("{}/orgs/{}", self.base_url, group);
        let organization: Organization = fetch_json(self.make_request(&url), &url)
            .await?
            .ok_or_else(|| ProviderError::GroupNotFound(group.to_string()))?;
        if organization.login.is_empty() {
            return Err(ProviderError::GroupNotFound(group.to_string()));
        }
        let login = organization.login;

        let url = format!("{}/repos/{}/{}", self.base_url, login, project);
        let repository: Repository = fetch_json(self.make_request(&url), &url)
            .await?
            .ok_or_else(|| ProviderError::ProjectNotFound {
                group: group.to_string(),
                project: project.to_string(),
            })?;

        let url = format!("{}/repos/{}/{}/releases", self.base_url, login, repository.name);
        let request = self
            .make_request(&url)
            .query(&[("per_page", RELEASE_LOOKAHEAD.to_string()), ("page", "1".to_string())]);
        let releases: Vec<Release> = fetch_json(request, &url)
            .await?
            .ok_or_else(|| ProviderError::Transport {
                url: url.clone(),
                message: "releases endpoint returned 404".to_string(),
            })?;
        debug!("{} releases listed for {}/{}", releases.len(), login, repository.name);

        Ok(select_release(
            releases
                .into_iter()
                .map(|release| (release.tag_name, release.published_at)),
            self.tag_filter,
            mode,
        ))
    }
}
