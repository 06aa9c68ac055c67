//! # Cluster
//!
//! The cluster capability the reconciler drives: find a workload, create a
//! manifest, delete a resource and restart pods by label. The production
//! implementation is [`KubeCluster`]; tests substitute an in-memory fake.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Service;
use thiserror::Error;

mod kubernetes;

pub use kubernetes::KubeCluster;

/// Kind of cluster object the operator manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CronJob,
    Deployment,
    Service,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::CronJob => "cronjob",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live cluster object as seen by one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResource {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    /// Images of the regular containers of the pod template
    pub container_images: Vec<String>,
    /// Names of the init containers of the pod template
    pub init_containers: Vec<String>,
}

/// Typed manifest ready to be created
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    CronJob(Box<CronJob>),
    Deployment(Box<Deployment>),
    Service(Box<Service>),
}

impl Manifest {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Manifest::CronJob(_) => ResourceKind::CronJob,
            Manifest::Deployment(_) => ResourceKind::Deployment,
            Manifest::Service(_) => ResourceKind::Service,
        }
    }

    fn metadata(&self) -> &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
        match self {
            Manifest::CronJob(job) => &job.metadata,
            Manifest::Deployment(deployment) => &deployment.metadata,
            Manifest::Service(service) => &service.metadata,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata().name.as_deref()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Namespace and name, both required before anything is sent to the cluster
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Decode`] when the namespace or name is missing.
    pub fn identity(&self) -> Result<(&str, &str), ClusterError> {
        let namespace = self.namespace().filter(|ns| !ns.is_empty());
        let name = self.name().filter(|name| !name.is_empty());
        match (namespace, name) {
            (Some(namespace), Some(name)) => Ok((namespace, name)),
            _ => Err(ClusterError::Decode {
                kind: self.kind(),
                message: "manifest must set metadata.namespace and metadata.name".to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{action} {target} failed: {message}")]
    Api {
        action: &'static str,
        target: String,
        message: String,
    },
    #[error("invalid {kind} manifest: {message}")]
    Decode { kind: ResourceKind, message: String },
}

/// Cluster operations used by the reconciler
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch the object, `Ok(None)` when it does not exist
    async fn find(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterResource>, ClusterError>;

    async fn create(&self, manifest: &Manifest) -> Result<(), ClusterError>;

    async fn delete_resource(&self, resource: &ClusterResource) -> Result<(), ClusterError>;

    /// Delete every pod in `namespace` matching `selector` so its controller restarts it
    async fn delete_pods_by_label(
        &self,
        namespace: &str,
        selector: &str,
        grace_period_secs: u32,
    ) -> Result<(), ClusterError>;
}
