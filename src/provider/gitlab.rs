//! # GitLab Releases
//!
//! Resolves the latest release through the GitLab REST API v4. The group is
//! found by search, projects of every matching group are searched for an
//! exact `path` match, and the first page of releases of that project is
//! inspected.

use super::common::{build_http_client, fetch_json, select_release, ClientOptions};
use super::{ProviderError, ReleaseInfo, ReleaseSource, TagFilter};
use crate::api::ServerMode;
use crate::constants::RELEASE_LOOKAHEAD;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Group {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    path: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    created_at: Option<String>,
}

pub struct GitLabClient {
    http_client: Client,
    base_url: String,
    token: String,
    tag_filter: TagFilter,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("base_url", &self.base_url)
            .field("tag_filter", &self.tag_filter)
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
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
        let request = self.http_client.get(url);
        if self.token.is_empty() {
            request
        } else {
            request.header("PRIVATE-TOKEN", &self.token)
        }
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let request = self.make_request(url).query(query);
        Ok(fetch_json(request, url).await?.unwrap_or_default())
    }
}

#[async_trait]
impl ReleaseSource for GitLabClient {
    fn provider_name(&self) -> &str {
        "GitLab"
    }

    async fn resolve_latest_release(
        &self,
        group: &str,
        project: &str,
        mode: ServerMode,
    ) -> Result<Option<ReleaseInfo>, ProviderError> {
        let url = format!("{}/groups", self.base_url);
        let groups: Vec<Group> = self.list(&url, &[("search", group.to_string())]).await?;
        if groups.is_empty() {
            return Err(ProviderError::GroupNotFound(group.to_string()));
        }

        let mut project_found = false;
        for found_group in &groups {
            let url = format!("{}/groups/{}/projects", self.base_url, found_group.id);
            let projects: Vec<Project> = self
                .list(
                    &url,
                    &[("owned", "true".to_string()), ("search", project.to_string())],
                )
                .await?;

            for candidate in projects.iter().filter(|p| p.path == project) {
                project_found = true;
                debug!("Found project {} (id {}) in group {}", candidate.path, candidate.id, found_group.id);

                let url = format!("{}/projects/{}/releases", self.base_url, candidate.id);
                let releases: Vec<Release> = self
                    .list(
                        &url,
                        &[
                            ("per_page", RELEASE_LOOKAHEAD.to_string()),
                            ("page", "1".to_string()),
                        ],
                    )
                    .await?;

                let selected = select_release(
                    releases
                        .into_iter()
                        .map(|release| (release.tag_name, release.created_at)),
                    self.tag_filter,
                    mode,
                );
                if selected.is_some() {
                    return Ok(selected);
                }
            }
        }

        if project_found {
            Ok(None)
        } else {
            Err(ProviderError::ProjectNotFound {
                group: group.to_string(),
                project: project.to_string(),
            })
        }
    }
}
