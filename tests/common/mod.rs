//! Common test utilities for integration tests
//!
//! Provides rustls setup for the Pact tests, an in-memory cluster, a static
//! release source and on-disk template/kustomization fixtures.

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use deploy_operator::api::ServerMode;
use deploy_operator::cluster::{ClusterClient, ClusterError, ClusterResource, Manifest, ResourceKind};
use deploy_operator::controller::reconciler::{ReconcilePolicy, Reconciler};
use deploy_operator::controller::templates::TemplateRegistry;
use deploy_operator::provider::{ProviderError, ProviderRegistry, ReleaseInfo, ReleaseSource};
use k8s_openapi::api::core::v1::PodSpec;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        deploy_operator::runtime::install_crypto_provider();
    });
}

/// Cluster call recorded by [`FakeCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(ResourceKind, String, String),
    Create(ResourceKind, String, String),
    Delete(ResourceKind, String, String),
    DeletePods {
        namespace: String,
        selector: String,
        grace_period_secs: u32,
    },
}

/// In-memory cluster keyed by kind, namespace and name
#[derive(Debug, Default)]
pub struct FakeCluster {
    resources: Mutex<BTreeMap<(String, String, String), ClusterResource>>,
    manifests: Mutex<Vec<Manifest>>,
    calls: Mutex<Vec<(Instant, Call)>>,
    fail_create: Mutex<bool>,
}

fn key(kind: ResourceKind, namespace: &str, name: &str) -> (String, String, String) {
    (kind.to_string(), namespace.to_string(), name.to_string())
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a live workload
    pub fn insert(&self, resource: ClusterResource) {
        self.resources.lock().unwrap().insert(
            key(resource.kind, &resource.namespace, &resource.name),
            resource,
        );
    }

    pub fn contains(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        self.resources
            .lock()
            .unwrap()
            .contains_key(&key(kind, namespace, name))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.timed_calls().into_iter().map(|(_, call)| call).collect()
    }

    /// Calls with the tokio clock reading at which they arrived
    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change the cluster
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Find(..)))
            .collect()
    }

    pub fn created(&self) -> Vec<Manifest> {
        self.manifests.lock().unwrap().clone()
    }

    pub fn fail_creates(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

/// Pod spec of a workload manifest
pub fn pod_spec(manifest: &Manifest) -> Option<&PodSpec> {
    match manifest {
        Manifest::CronJob(job) => job
            .spec
            .as_ref()
            .and_then(|spec| spec.job_template.spec.as_ref())
            .and_then(|spec| spec.template.spec.as_ref()),
        Manifest::Deployment(deployment) => deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref()),
        Manifest::Service(_) => None,
    }
}

/// Images of the regular containers of a workload manifest
pub fn container_images(manifest: &Manifest) -> Vec<String> {
    pod_spec(manifest)
        .map(|spec| {
            spec.containers
                .iter()
                .filter_map(|container| container.image.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn summarize(manifest: &Manifest) -> ClusterResource {
    let init_containers = pod_spec(manifest)
        .and_then(|spec| spec.init_containers.as_ref())
        .map(|containers| containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    ClusterResource {
        kind: manifest.kind(),
        namespace: manifest.namespace().unwrap_or_default().to_string(),
        name: manifest.name().unwrap_or_default().to_string(),
        container_images: container_images(manifest),
        init_containers,
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn find(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterResource>, ClusterError> {
        self.record(Call::Find(kind, namespace.to_string(), name.to_string()));
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&key(kind, namespace, name))
            .cloned())
    }

    async fn create(&self, manifest: &Manifest) -> Result<(), ClusterError> {
        let resource = summarize(manifest);
        self.record(Call::Create(
            resource.kind,
            resource.namespace.clone(),
            resource.name.clone(),
        ));
        if *self.fail_create.lock().unwrap() {
            return Err(ClusterError::Api {
                action: "create",
                target: format!("{} {}/{}", resource.kind, resource.namespace, resource.name),
                message: "admission webhook denied the request".to_string(),
            });
        }
        self.manifests.lock().unwrap().push(manifest.clone());
        self.insert(resource);
        Ok(())
    }

    async fn delete_resource(&self, resource: &ClusterResource) -> Result<(), ClusterError> {
        self.record(Call::Delete(
            resource.kind,
            resource.namespace.clone(),
            resource.name.clone(),
        ));
        self.resources
            .lock()
            .unwrap()
            .remove(&key(resource.kind, &resource.namespace, &resource.name));
        Ok(())
    }

    async fn delete_pods_by_label(
        &self,
        namespace: &str,
        selector: &str,
        grace_period_secs: u32,
    ) -> Result<(), ClusterError> {
        self.record(Call::DeletePods {
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            grace_period_secs,
        });
        Ok(())
    }
}

/// Canned answer of [`StaticReleases`]
#[derive(Debug, Clone)]
pub enum Answer {
    Release(ReleaseInfo),
    Absent,
    GroupNotFound,
    Unavailable,
}

/// Release source answering every lookup the same way
#[derive(Debug)]
pub struct StaticReleases {
    name: String,
    answer: Answer,
    lookups: AtomicUsize,
}

impl StaticReleases {
    pub fn new(name: &str, answer: Answer) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            answer,
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn tag(tag: &str) -> Arc<Self> {
        Self::new(
            "GitHub",
            Answer::Release(ReleaseInfo {
                image_tag: tag.to_string(),
                release_date: "Wed, 1 May 2024 10:00:00 +0000".to_string(),
            }),
        )
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseSource for StaticReleases {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn resolve_latest_release(
        &self,
        group: &str,
        _project: &str,
        _mode: ServerMode,
    ) -> Result<Option<ReleaseInfo>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Answer::Release(release) => Ok(Some(release.clone())),
            Answer::Absent => Ok(None),
            Answer::GroupNotFound => Err(ProviderError::GroupNotFound(group.to_string())),
            Answer::Unavailable => Err(ProviderError::Transport {
                url: "https://api.github.com/orgs/acme".to_string(),
                message: "status 503 Service Unavailable".to_string(),
            }),
        }
    }
}

pub const DEPLOYMENT_TEMPLATE: &str = r"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ .Name }}
  namespace: {{ .Ns }}
  labels:
    sia-app: {{ .Name }}
    tier: '{{ .Tier }}'
spec:
  selector:
    matchLabels:
      sia-app: {{ .Name }}
  template:
    metadata:
      labels:
        sia-app: {{ .Name }}
    spec:
      initContainers:
        - name: migrate
          image: registry.example.com/{{ .Group }}/{{ .Project }}-migrate:{{ .ImageTag }}
      containers:
        - name: app
          image: registry.example.com/{{ .Group }}/{{ .Project }}:{{ .ImageTag }}
";

pub const CRONJOB_TEMPLATE: &str = r"apiVersion: batch/v1
kind: CronJob
metadata:
  name: {{ .Name }}
  namespace: {{ .Ns }}
spec:
  schedule: '{{ .Schedule }}'
  jobTemplate:
    spec:
      template:
        metadata:
          labels:
            sia-app: {{ .Name }}
        spec:
          restartPolicy: Never
          containers:
            - name: job
              image: registry.example.com/{{ .Group }}/{{ .Project }}:{{ .ImageTag }}
";

pub const SERVICE_TEMPLATE: &str = r"apiVersion: v1
kind: Service
metadata:
  name: {{ .Name }}
  namespace: {{ .Ns }}
  annotations:
    deploy/timeout: '{{ .Timeout }}'
spec:
  selector:
    sia-app: {{ .Name }}
  ports:
    - port: 80
      targetPort: 8080
";

pub fn deployment_descriptor(namespace: &str, name: &str) -> String {
    format!(
        r"ns: {namespace}
name: {name}
kind: deployment
repository:
  provider: github.com
  group: acme
  project: {name}
env:
  - name: LOG_LEVEL
    value: info
"
    )
}

/// Template and kustomization directories of one test
#[derive(Debug)]
pub struct Fixture {
    pub templates: TempDir,
    pub kustomizations: TempDir,
}

impl Fixture {
    /// Default deployment, cronjob and `http` service templates
    pub fn new() -> Self {
        let fixture = Self {
            templates: TempDir::new().unwrap(),
            kustomizations: TempDir::new().unwrap(),
        };
        fixture.template("deployment.yaml", DEPLOYMENT_TEMPLATE);
        fixture.template("cronjob.yaml", CRONJOB_TEMPLATE);
        fixture.template("service-http.yaml", SERVICE_TEMPLATE);
        fixture
    }

    pub fn template(&self, file_name: &str, content: &str) {
        std::fs::write(self.templates.path().join(file_name), content).unwrap();
    }

    /// Write `kustomization.yaml` into `dir` below the kustomization root
    pub fn descriptor(&self, dir: &str, content: &str) -> std::path::PathBuf {
        self.file(&format!("{dir}/kustomization.yaml"), content)
    }

    pub fn file(&self, relative: &str, content: &str) -> std::path::PathBuf {
        let path = self.kustomizations.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn root(&self) -> &Path {
        self.kustomizations.path()
    }

    pub fn registry(&self) -> Arc<TemplateRegistry> {
        Arc::new(TemplateRegistry::load(self.templates.path()).unwrap())
    }

    /// Reconciler with `source` registered as `github.com` and no settle delay
    pub fn reconciler(
        &self,
        cluster: Arc<FakeCluster>,
        source: Arc<dyn ReleaseSource>,
        policy: ReconcilePolicy,
    ) -> Reconciler {
        Reconciler::new(
            self.registry(),
            ProviderRegistry::default().with_source("github.com", source),
            cluster,
            policy,
        )
    }
}

/// Default policy without the removal wait
pub fn fast_policy() -> ReconcilePolicy {
    ReconcilePolicy {
        removal_settle_delay: Duration::ZERO,
        ..ReconcilePolicy::default()
    }
}

pub fn live_deployment(namespace: &str, name: &str, tag: &str) -> ClusterResource {
    ClusterResource {
        kind: ResourceKind::Deployment,
        namespace: namespace.to_string(),
        name: name.to_string(),
        container_images: vec![format!("registry.example.com/acme/{name}:{tag}")],
        init_containers: vec!["migrate".to_string()],
    }
}
