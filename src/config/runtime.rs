//! # Operator Configuration
//!
//! Runtime tuning loaded from environment variables.

use crate::controller::reconciler::UpdatePolicy;
use crate::provider::TagFilter;
use std::time::Duration;
use tracing::warn;

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Maximum number of descriptors one deploy request may touch
    pub max_services_per_request: usize,
    /// Wait after a removal before continuing (milliseconds)
    pub removal_settle_delay_ms: u64,
    /// Grace period for pods deleted on restart (seconds)
    pub pod_restart_grace_secs: u32,
    /// Label key selecting the pods of a workload (`<key>=<name>`)
    pub restart_label_key: String,
    /// Whether an update always restarts or only when the image tag moved
    pub update_policy: UpdatePolicy,
    /// Release tag filtering by server mode suffix
    pub tag_filter: TagFilter,
    /// Timeout for release provider requests (seconds)
    pub provider_timeout_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            max_services_per_request: DEFAULT_MAX_SERVICES_PER_REQUEST,
            removal_settle_delay_ms: DEFAULT_REMOVAL_SETTLE_DELAY_MS,
            pod_restart_grace_secs: DEFAULT_POD_RESTART_GRACE_SECS,
            restart_label_key: DEFAULT_RESTART_LABEL_KEY.to_string(),
            update_policy: UpdatePolicy::default(),
            tag_filter: TagFilter::default(),
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            max_services_per_request: env_var_or_default(
                "MAX_SERVICES_PER_REQUEST",
                DEFAULT_MAX_SERVICES_PER_REQUEST,
            ),
            removal_settle_delay_ms: env_var_or_default(
                "REMOVAL_SETTLE_DELAY_MS",
                DEFAULT_REMOVAL_SETTLE_DELAY_MS,
            ),
            pod_restart_grace_secs: env_var_or_default(
                "POD_RESTART_GRACE_SECS",
                DEFAULT_POD_RESTART_GRACE_SECS,
            ),
            restart_label_key: env_var_or_default_str(
                "RESTART_LABEL_KEY",
                DEFAULT_RESTART_LABEL_KEY,
            ),
            update_policy: env_var_or_default("UPDATE_POLICY", UpdatePolicy::default()),
            tag_filter: env_var_or_default("TAG_FILTER", TagFilter::default()),
            provider_timeout_secs: env_var_or_default(
                "PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Get removal settle delay duration
    #[must_use]
    pub fn removal_settle_delay(&self) -> Duration {
        Duration::from_millis(self.removal_settle_delay_ms)
    }

    /// Get provider request timeout duration
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring invalid value {:?} for {}: {}", raw, key, e);
            default
        }),
        Err(_) => default,
    }
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = OperatorConfig::default();
        assert_eq!(config.max_services_per_request, 32);
        assert_eq!(config.removal_settle_delay(), Duration::from_secs(2));
        assert_eq!(config.pod_restart_grace_secs, 5);
        assert_eq!(config.restart_label_key, "sia-app");
        assert_eq!(config.update_policy, UpdatePolicy::AlwaysRestart);
        assert_eq!(config.tag_filter, TagFilter::Disabled);
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        // Unique key so parallel tests never race on it
        let key = "DEPLOY_OPERATOR_TEST_GARBAGE_NUMBER";
        std::env::set_var(key, "not-a-number");
        assert_eq!(env_var_or_default(key, 7_u64), 7);
        std::env::set_var(key, "11");
        assert_eq!(env_var_or_default(key, 7_u64), 11);
        std::env::remove_var(key);
    }

    #[test]
    fn test_env_var_or_default_parses_policies() {
        let key = "DEPLOY_OPERATOR_TEST_POLICY";
        std::env::set_var(key, "restart-on-tag-change");
        assert_eq!(
            env_var_or_default(key, UpdatePolicy::default()),
            UpdatePolicy::RestartOnTagChange
        );
        std::env::remove_var(key);
    }
}
