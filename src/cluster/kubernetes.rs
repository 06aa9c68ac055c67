//! `kube`-backed implementation of [`ClusterClient`].

use super::{ClusterClient, ClusterError, ClusterResource, Manifest, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Pod, PodSpec, Service};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::{debug, info};

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn api_error(
    action: &'static str,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    error: &kube::Error,
) -> ClusterError {
    ClusterError::Api {
        action,
        target: format!("{kind} `{namespace}/{name}`"),
        message: error.to_string(),
    }
}

fn summarize(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    pod_spec: Option<&PodSpec>,
) -> ClusterResource {
    let container_images = pod_spec
        .map(|spec| {
            spec.containers
                .iter()
                .filter_map(|container| container.image.clone())
                .collect()
        })
        .unwrap_or_default();
    let init_containers = pod_spec
        .and_then(|spec| spec.init_containers.as_ref())
        .map(|containers| containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();

    ClusterResource {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
        container_images,
        init_containers,
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn find(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterResource>, ClusterError> {
        debug!("Find {} {}/{}", kind, namespace, name);
        let found = match kind {
            ResourceKind::CronJob => {
                let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(name)
                    .await
                    .map_err(|e| api_error("get", kind, namespace, name, &e))?
                    .map(|job| {
                        let pod_spec = job
                            .spec
                            .as_ref()
                            .and_then(|spec| spec.job_template.spec.as_ref())
                            .and_then(|spec| spec.template.spec.as_ref());
                        summarize(kind, namespace, name, pod_spec)
                    })
            }
            ResourceKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(name)
                    .await
                    .map_err(|e| api_error("get", kind, namespace, name, &e))?
                    .map(|deployment| {
                        let pod_spec = deployment
                            .spec
                            .as_ref()
                            .and_then(|spec| spec.template.spec.as_ref());
                        summarize(kind, namespace, name, pod_spec)
                    })
            }
            ResourceKind::Service => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(name)
                    .await
                    .map_err(|e| api_error("get", kind, namespace, name, &e))?
                    .map(|_| summarize(kind, namespace, name, None))
            }
        };
        Ok(found)
    }

    async fn create(&self, manifest: &Manifest) -> Result<(), ClusterError> {
        let (namespace, name) = manifest.identity()?;
        let kind = manifest.kind();
        let params = PostParams::default();

        match manifest {
            Manifest::CronJob(job) => {
                let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
                api.create(&params, job)
                    .await
                    .map_err(|e| api_error("create", kind, namespace, name, &e))?;
            }
            Manifest::Deployment(deployment) => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.create(&params, deployment)
                    .await
                    .map_err(|e| api_error("create", kind, namespace, name, &e))?;
            }
            Manifest::Service(service) => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                api.create(&params, service)
                    .await
                    .map_err(|e| api_error("create", kind, namespace, name, &e))?;
            }
        }

        info!("Created {} {}/{}", kind, namespace, name);
        Ok(())
    }

    async fn delete_resource(&self, resource: &ClusterResource) -> Result<(), ClusterError> {
        let ClusterResource {
            kind,
            namespace,
            name,
            ..
        } = resource;
        let params = DeleteParams::default();

        match kind {
            ResourceKind::CronJob => {
                let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
                api.delete(name, &params)
                    .await
                    .map_err(|e| api_error("delete", *kind, namespace, name, &e))?;
            }
            ResourceKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.delete(name, &params)
                    .await
                    .map_err(|e| api_error("delete", *kind, namespace, name, &e))?;
            }
            ResourceKind::Service => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                api.delete(name, &params)
                    .await
                    .map_err(|e| api_error("delete", *kind, namespace, name, &e))?;
            }
        }

        info!("Deleted {} {}/{}", kind, namespace, name);
        Ok(())
    }

    async fn delete_pods_by_label(
        &self,
        namespace: &str,
        selector: &str,
        grace_period_secs: u32,
    ) -> Result<(), ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            grace_period_seconds: Some(grace_period_secs),
            ..DeleteParams::default()
        };
        api.delete_collection(&params, &ListParams::default().labels(selector))
            .await
            .map_err(|e| ClusterError::Api {
                action: "delete",
                target: format!("pods in `{namespace}` matching `{selector}`"),
                message: e.to_string(),
            })?;

        info!("Deleted pods in {} matching {}", namespace, selector);
        Ok(())
    }
}
