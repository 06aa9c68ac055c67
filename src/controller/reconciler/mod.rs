//! # Reconciler
//!
//! Reconciles one kustomization descriptor against the cluster.
//!
//! For each descriptor the reconciler:
//!
//! 1. Reads and parses the descriptor
//! 2. Resolves the latest release from the configured provider
//! 3. Looks up the live workload
//! 4. Decides on a single action (see [`decision`]) and applies it
//! 5. For deployments with a `service` section, creates the companion service if absent
//!
//! Any failure aborts that descriptor only and ends up in its `errorDescription`.

pub mod decision;
pub mod types;
pub mod workload;

pub use decision::{decide, Plan};
pub use types::{ReconcileError, ReconcilePolicy, UpdatePolicy};
pub use workload::WorkloadKind;

use crate::api::{Action, Outcome, ServerMode, ServiceResult};
use crate::cluster::{ClusterClient, ClusterResource, Manifest, ResourceKind};
use crate::constants::{KUSTOMIZATION_FILE_NAME, SERVER_MODE_ENV_NAME};
use crate::controller::descriptor::{Descriptor, EnvVarSpec};
use crate::controller::manifest;
use crate::controller::render;
use crate::controller::templates::TemplateRegistry;
use crate::observability::metrics;
use crate::provider::{ProviderRegistry, ReleaseInfo};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

pub struct Reconciler {
    templates: Arc<TemplateRegistry>,
    providers: ProviderRegistry,
    cluster: Arc<dyn ClusterClient>,
    policy: ReconcilePolicy,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("templates", &self.templates.len())
            .field("providers", &self.providers)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Fields of the service result known before the action is decided
#[derive(Debug, Default)]
struct Progress {
    service_id: Option<crate::api::ServiceId>,
    provider: String,
    release: Option<ReleaseInfo>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        templates: Arc<TemplateRegistry>,
        providers: ProviderRegistry,
        cluster: Arc<dyn ClusterClient>,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            templates,
            providers,
            cluster,
            policy,
        }
    }

    /// Reconcile the descriptor file at `file`, reported under `display_path`
    pub async fn reconcile_file(
        &self,
        file: &Path,
        display_path: String,
        recreate: bool,
        mode: ServerMode,
    ) -> ServiceResult {
        let span = info_span!("reconcile", path = %display_path, recreate, mode = %mode);
        let mut progress = Progress::default();
        let outcome = match self
            .reconcile_descriptor(file, recreate, mode, &mut progress)
            .instrument(span.clone())
            .await
        {
            Ok(action) => {
                span.in_scope(|| info!("Descriptor reconciled: {:?}", action));
                metrics::record_service_action(action);
                Outcome::Action(action)
            }
            Err(e) => {
                span.in_scope(|| warn!("Descriptor failed: {}", e));
                metrics::increment_service_errors();
                Outcome::ErrorDescription(e.to_string())
            }
        };

        ServiceResult {
            path: display_path,
            service_id: progress.service_id,
            provider: progress.provider,
            release: progress.release,
            outcome,
        }
    }

    async fn reconcile_descriptor(
        &self,
        file: &Path,
        recreate: bool,
        mode: ServerMode,
        progress: &mut Progress,
    ) -> Result<Action, ReconcileError> {
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name != KUSTOMIZATION_FILE_NAME {
            return Err(ReconcileError::WrongFileName(file_name));
        }

        let content = tokio::fs::read(file).await.map_err(ReconcileError::Read)?;
        let descriptor = Descriptor::parse(&content)?;
        progress.service_id = Some(descriptor.service_id());

        let repository = &descriptor.repository;
        let source = self.providers.get(&repository.provider)?;
        progress.provider = source.provider_name().to_string();

        let disabled = descriptor.disabled_in(mode);
        let release = source
            .resolve_latest_release(&repository.group, &repository.project, mode)
            .await?
            .filter(|release| !release.image_tag.is_empty())
            .ok_or(ReconcileError::ReleaseNotFound)?;
        progress.release = Some(release.clone());

        info!(
            "srv: {}/{} - {}:{}",
            repository.group, descriptor.name, descriptor.kind, release.image_tag
        );

        let workload = WorkloadKind::from_descriptor(&descriptor)
            .ok_or_else(|| ReconcileError::UnknownKind(descriptor.kind.clone()))?;

        let action = self
            .apply_workload(workload, &descriptor, &release, recreate, disabled, mode)
            .await?;

        if workload.has_service_side_channel() && !disabled {
            self.apply_service(&descriptor).await?;
        }

        Ok(action)
    }

    async fn apply_workload(
        &self,
        workload: WorkloadKind,
        descriptor: &Descriptor,
        release: &ReleaseInfo,
        recreate: bool,
        disabled: bool,
        mode: ServerMode,
    ) -> Result<Action, ReconcileError> {
        let kind = workload.resource_kind();
        let found = self
            .cluster
            .find(kind, &descriptor.namespace, &descriptor.name)
            .await?;
        let plan = decide(found.is_some(), recreate, disabled);
        debug!("Plan for {} {}/{}: {:?}", kind, descriptor.namespace, descriptor.name, plan);

        match (plan, found) {
            (Plan::Update, Some(live)) => self.restart(&live, &release.image_tag).await,
            (Plan::Remove, Some(live)) => {
                self.remove(&live).await?;
                Ok(plan.reported_action())
            }
            (Plan::Recreate, Some(live)) => {
                let manifest = self.build_workload(workload, descriptor, release, mode)?;
                self.remove(&live).await?;
                self.cluster.create(&manifest).await?;
                Ok(plan.reported_action())
            }
            (Plan::Create(action), _) => {
                let manifest = self.build_workload(workload, descriptor, release, mode)?;
                self.cluster.create(&manifest).await?;
                Ok(action)
            }
            _ => Ok(Action::NotChanged),
        }
    }

    /// Render, decode and inject the environment of a workload manifest
    fn build_workload(
        &self,
        workload: WorkloadKind,
        descriptor: &Descriptor,
        release: &ReleaseInfo,
        mode: ServerMode,
    ) -> Result<Manifest, ReconcileError> {
        let kind = workload.resource_kind();
        let tier = workload.template_tier(descriptor);
        let template =
            self.templates
                .get(kind, tier)
                .ok_or_else(|| ReconcileError::MissingTemplate {
                    kind,
                    tier: tier.to_string(),
                })?;

        let text = render::render(kind, descriptor, &release.image_tag, template)
            .map_err(|source| ReconcileError::Render { kind, source })?;
        let mut manifest = manifest::decode(kind, &text)?;

        let init_env = [EnvVarSpec::literal(SERVER_MODE_ENV_NAME, mode.as_str())];
        let injection = manifest::inject_environment(&mut manifest, &descriptor.env, &init_env)?;
        if !injection.init_container_found {
            warn!(
                "{} {}/{} has no init containers; bug in config",
                kind, descriptor.namespace, descriptor.name
            );
        }
        Ok(manifest)
    }

    async fn remove(&self, live: &ClusterResource) -> Result<(), ReconcileError> {
        self.cluster.delete_resource(live).await?;
        if !self.policy.removal_settle_delay.is_zero() {
            tokio::time::sleep(self.policy.removal_settle_delay).await;
        }
        Ok(())
    }

    async fn restart(&self, live: &ClusterResource, image_tag: &str) -> Result<Action, ReconcileError> {
        if live.init_containers.is_empty() {
            warn!(
                "{} {}/{} has no init containers",
                live.kind, live.namespace, live.name
            );
        }

        if self.policy.update_policy == UpdatePolicy::RestartOnTagChange {
            let suffix = format!(":{image_tag}");
            let current = !live.container_images.is_empty()
                && live
                    .container_images
                    .iter()
                    .all(|image| image.ends_with(&suffix));
            if current {
                info!("{} {}/{} already runs {}", live.kind, live.namespace, live.name, image_tag);
                return Ok(Action::NotChanged);
            }
        }

        let selector = format!("{}={}", self.policy.restart_label_key, live.name);
        self.cluster
            .delete_pods_by_label(&live.namespace, &selector, self.policy.pod_restart_grace_secs)
            .await?;
        Ok(Action::Updated)
    }

    /// Create the companion service of a deployment unless it already exists
    async fn apply_service(&self, descriptor: &Descriptor) -> Result<(), ReconcileError> {
        let Some(service) = descriptor.service.as_ref() else {
            return Ok(());
        };
        let tier = service.service_template.as_str();
        let template = self
            .templates
            .get(ResourceKind::Service, tier)
            .ok_or_else(|| ReconcileError::MissingTemplate {
                kind: ResourceKind::Service,
                tier: tier.to_string(),
            })?;

        let text = render::render(ResourceKind::Service, descriptor, "", template).map_err(
            |source| ReconcileError::Render {
                kind: ResourceKind::Service,
                source,
            },
        )?;
        let manifest = manifest::decode(ResourceKind::Service, &text)?;
        let (namespace, name) = manifest.identity()?;

        if self
            .cluster
            .find(ResourceKind::Service, namespace, name)
            .await?
            .is_some()
        {
            debug!("Service {}/{} already exists", namespace, name);
            return Ok(());
        }

        self.cluster.create(&manifest).await?;
        info!("Service {}/{} created", namespace, name);
        Ok(())
    }
}
