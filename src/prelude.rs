//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use deploy_operator::prelude::*;
//! ```

// Wire types of the deploy operation
pub use crate::api::{
    Action, DeployRequest, DeployResponse, Outcome, ServerMode, ServiceId, ServiceResult,
};

// Collaborator traits - needed for plugging in fakes
pub use crate::cluster::{ClusterClient, ClusterError, ClusterResource, Manifest, ResourceKind};
pub use crate::provider::{ProviderError, ProviderRegistry, ReleaseInfo, ReleaseSource};

// Reconciler types - core operator functionality
pub use crate::controller::batch::{BatchError, Deployer};
pub use crate::controller::reconciler::{
    ReconcileError, ReconcilePolicy, Reconciler, UpdatePolicy,
};
pub use crate::controller::templates::TemplateRegistry;

// Config types
pub use crate::config::{DeployConfig, OperatorConfig};
