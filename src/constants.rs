//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! the deploy config file or environment variables where applicable.

/// Default location of the deploy config file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/deploy/config.yaml";

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "DEPLOY_CONFIG";

/// Default listen port of the deploy API
pub const DEFAULT_SERVER_PORT: u16 = 8443;

/// The only file name accepted as a kustomization descriptor
pub const KUSTOMIZATION_FILE_NAME: &str = "kustomization.yaml";

/// Default maximum number of descriptors handled by one deploy request
pub const DEFAULT_MAX_SERVICES_PER_REQUEST: usize = 32;

/// Default pause after deleting a workload, before a replacement is created (milliseconds)
pub const DEFAULT_REMOVAL_SETTLE_DELAY_MS: u64 = 2000;

/// Default grace period for pods deleted by a restart (seconds)
pub const DEFAULT_POD_RESTART_GRACE_SECS: u32 = 5;

/// Default label key used to select the pods of a workload on restart
pub const DEFAULT_RESTART_LABEL_KEY: &str = "sia-app";

/// Default timeout for release provider HTTP requests (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Number of releases inspected per lookup (first page only)
pub const RELEASE_LOOKAHEAD: usize = 3;

/// Default GitHub REST API base URL
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Maximum accepted deploy request body (bytes)
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Environment variable injected into the first init container of every workload
pub const SERVER_MODE_ENV_NAME: &str = "APP_SERVER_MODE";

/// User agent sent to release providers
pub const USER_AGENT: &str = "deploy-operator";
