//! # Common Provider Utilities
//!
//! Shared HTTP plumbing and release selection used by every provider client.

use super::{ProviderError, ReleaseInfo, TagFilter};
use crate::api::ServerMode;
use crate::constants::{DEFAULT_PROVIDER_TIMEOUT_SECS, RELEASE_LOOKAHEAD, USER_AGENT};
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Settings shared by all provider clients
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub tag_filter: TagFilter,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            tag_filter: TagFilter::default(),
        }
    }
}

/// Build the HTTP client of one provider
pub(crate) fn build_http_client(
    base_url: &str,
    options: &ClientOptions,
    insecure_skip_tls_verify: bool,
) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(options.timeout)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(insecure_skip_tls_verify)
        .build()
        .map_err(|e| ProviderError::Transport {
            url: base_url.to_string(),
            message: format!("failed to create HTTP client: {e}"),
        })
}

/// Send a GET request and decode its JSON body
///
/// `Ok(None)` is returned for 404 so callers can map it to their lookup error.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &str,
) -> Result<Option<T>, ProviderError> {
    debug!("GET {}", url);
    let response = request.send().await.map_err(|e| ProviderError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Transport {
            url: url.to_string(),
            message: format!("status {status}: {body}"),
        });
    }

    let body = response.text().await.map_err(|e| ProviderError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|e| ProviderError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Pick the first viable release among the most recent ones
///
/// Candidates arrive newest first as `(tag, raw RFC 3339 date)`. Only the
/// first page lookahead is inspected; empty tags are never viable.
pub(crate) fn select_release<I>(
    candidates: I,
    filter: TagFilter,
    mode: ServerMode,
) -> Option<ReleaseInfo>
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    candidates
        .into_iter()
        .take(RELEASE_LOOKAHEAD)
        .filter(|(tag, _)| !tag.is_empty())
        .find(|(tag, _)| {
            let accepted = filter.accepts(tag, mode);
            if !accepted {
                debug!("Tag {} has no `{}` suffix, skipping", tag, mode);
            }
            accepted
        })
        .map(|(tag, date)| ReleaseInfo {
            image_tag: tag,
            release_date: format_release_date(date.as_deref()),
        })
}

/// Render a provider timestamp as RFC 2822, empty when missing or unparsable
pub(crate) fn format_release_date(raw: Option<&str>) -> String {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|date| date.to_rfc2822())
        .unwrap_or_default()
}
