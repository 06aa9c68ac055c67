//! # Manifest
//!
//! Decodes rendered manifest text into typed Kubernetes objects and injects
//! environment variables into their pod templates.

use crate::cluster::{Manifest, ResourceKind};
use crate::controller::descriptor::{EnvValue, EnvVarSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, EnvVar, EnvVarSource, PodSpec, SecretKeySelector,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("can not decode {kind} manifest: {message}")]
    Decode { kind: ResourceKind, message: String },
    #[error("{kind} manifest has no pod template")]
    MissingPodTemplate { kind: ResourceKind },
}

/// Decode YAML text into the typed object of `kind`
///
/// `apiVersion` and `kind` of the document must match (`batch/v1 CronJob`,
/// `apps/v1 Deployment`, `v1 Service`).
///
/// # Errors
///
/// Returns [`ManifestError::Decode`] when the text is not a valid manifest of `kind`.
pub fn decode(kind: ResourceKind, text: &str) -> Result<Manifest, ManifestError> {
    let decode_error = |e: serde_yaml::Error| ManifestError::Decode {
        kind,
        message: e.to_string(),
    };
    let manifest = match kind {
        ResourceKind::CronJob => Manifest::CronJob(Box::new(
            serde_yaml::from_str(text).map_err(decode_error)?,
        )),
        ResourceKind::Deployment => Manifest::Deployment(Box::new(
            serde_yaml::from_str(text).map_err(decode_error)?,
        )),
        ResourceKind::Service => Manifest::Service(Box::new(
            serde_yaml::from_str(text).map_err(decode_error)?,
        )),
    };
    Ok(manifest)
}

fn pod_spec_mut(manifest: &mut Manifest) -> Option<&mut PodSpec> {
    match manifest {
        Manifest::CronJob(job) => job
            .spec
            .as_mut()
            .and_then(|spec| spec.job_template.spec.as_mut())
            .and_then(|spec| spec.template.spec.as_mut()),
        Manifest::Deployment(deployment) => deployment
            .spec
            .as_mut()
            .and_then(|spec| spec.template.spec.as_mut()),
        Manifest::Service(_) => None,
    }
}

fn to_env_var(spec: &EnvVarSpec) -> EnvVar {
    let (value, value_from) = match &spec.value {
        EnvValue::Literal(value) => (Some(value.clone()), None),
        EnvValue::SecretKey(reference) => (
            None,
            Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: reference.name.clone(),
                    key: reference.key.clone(),
                    ..SecretKeySelector::default()
                }),
                ..EnvVarSource::default()
            }),
        ),
        EnvValue::ConfigMapKey(reference) => (
            None,
            Some(EnvVarSource {
                config_map_key_ref: Some(ConfigMapKeySelector {
                    name: reference.name.clone(),
                    key: reference.key.clone(),
                    ..ConfigMapKeySelector::default()
                }),
                ..EnvVarSource::default()
            }),
        ),
    };
    EnvVar {
        name: spec.name.clone(),
        value,
        value_from,
    }
}

fn append_env(container: &mut Container, env: &[EnvVarSpec]) {
    container
        .env
        .get_or_insert_with(Vec::new)
        .extend(env.iter().map(to_env_var));
}

/// Outcome of [`inject_environment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Injection {
    /// The first init container received the init variables
    pub init_container_found: bool,
}

/// Append `env` to the first container and `init_env` to the first init container
///
/// A workload without init containers is still valid; the caller decides how
/// loudly to report it.
///
/// # Errors
///
/// Returns [`ManifestError::MissingPodTemplate`] when the manifest has no pod spec.
pub fn inject_environment(
    manifest: &mut Manifest,
    env: &[EnvVarSpec],
    init_env: &[EnvVarSpec],
) -> Result<Injection, ManifestError> {
    let kind = manifest.kind();
    let pod_spec =
        pod_spec_mut(manifest).ok_or(ManifestError::MissingPodTemplate { kind })?;

    if !env.is_empty() {
        if let Some(container) = pod_spec.containers.first_mut() {
            append_env(container, env);
        }
    }

    let init_container = pod_spec
        .init_containers
        .as_mut()
        .and_then(|containers| containers.first_mut());
    let init_container_found = init_container.is_some();
    if let Some(container) = init_container {
        append_env(container, init_env);
    }

    Ok(Injection {
        init_container_found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::descriptor::KeyRef;

    const DEPLOYMENT: &str = r"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: billing-api
  namespace: billing
spec:
  selector:
    matchLabels:
      sia-app: billing-api
  template:
    metadata:
      labels:
        sia-app: billing-api
    spec:
      initContainers:
        - name: migrate
          image: acme/billing-migrate:v1
      containers:
        - name: app
          image: acme/billing-api:v1
          env:
            - name: EXISTING
              value: kept
        - name: sidecar
          image: envoy:v1
";

    const CRONJOB: &str = r"
apiVersion: batch/v1
kind: CronJob
metadata:
  name: cleanup
  namespace: ops
spec:
  schedule: '*/5 * * * *'
  jobTemplate:
    spec:
      template:
        spec:
          restartPolicy: Never
          containers:
            - name: cleanup
              image: acme/cleanup:v2
";

    fn env() -> Vec<EnvVarSpec> {
        vec![
            EnvVarSpec::literal("LOG_LEVEL", "info"),
            EnvVarSpec {
                name: "DB_PASSWORD".to_string(),
                value: EnvValue::SecretKey(KeyRef {
                    name: "billing-db".to_string(),
                    key: "password".to_string(),
                }),
            },
        ]
    }

    fn pod_spec(manifest: &mut Manifest) -> PodSpec {
        pod_spec_mut(manifest).cloned().unwrap()
    }

    #[test]
    fn test_decode_deployment_and_inject() {
        let mut manifest = decode(ResourceKind::Deployment, DEPLOYMENT).unwrap();
        assert_eq!(manifest.identity().unwrap(), ("billing", "billing-api"));

        let injection = inject_environment(
            &mut manifest,
            &env(),
            &[EnvVarSpec::literal("APP_SERVER_MODE", "prod")],
        )
        .unwrap();
        assert!(injection.init_container_found);

        let spec = pod_spec(&mut manifest);
        let app_env = spec.containers[0].env.clone().unwrap();
        assert_eq!(app_env.len(), 3);
        assert_eq!(app_env[0].name, "EXISTING");
        assert_eq!(app_env[1].value.as_deref(), Some("info"));
        let secret = app_env[2]
            .value_from
            .as_ref()
            .and_then(|source| source.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(secret.key, "password");
        assert!(spec.containers[1].env.is_none());

        let init_env = spec.init_containers.unwrap()[0].env.clone().unwrap();
        assert_eq!(init_env[0].name, "APP_SERVER_MODE");
        assert_eq!(init_env[0].value.as_deref(), Some("prod"));
    }

    #[test]
    fn test_cronjob_without_init_containers() {
        let mut manifest = decode(ResourceKind::CronJob, CRONJOB).unwrap();
        let injection = inject_environment(
            &mut manifest,
            &[],
            &[EnvVarSpec::literal("APP_SERVER_MODE", "devel")],
        )
        .unwrap();
        assert!(!injection.init_container_found);
        assert!(pod_spec(&mut manifest).containers[0].env.is_none());
    }

    #[test]
    fn test_config_map_reference() {
        let mut manifest = decode(ResourceKind::CronJob, CRONJOB).unwrap();
        let env = vec![EnvVarSpec {
            name: "FLAGS".to_string(),
            value: EnvValue::ConfigMapKey(KeyRef {
                name: "features".to_string(),
                key: "flags".to_string(),
            }),
        }];
        inject_environment(&mut manifest, &env, &[]).unwrap();
        let container_env = pod_spec(&mut manifest).containers[0].env.clone().unwrap();
        let selector = container_env[0]
            .value_from
            .as_ref()
            .and_then(|source| source.config_map_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.key, "flags");
    }

    #[test]
    fn test_kind_mismatch_is_decode_error() {
        let err = decode(ResourceKind::CronJob, DEPLOYMENT).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Decode {
                kind: ResourceKind::CronJob,
                ..
            }
        ));
    }

    #[test]
    fn test_service_has_no_pod_template() {
        let mut manifest = decode(
            ResourceKind::Service,
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: a\n  namespace: b\n",
        )
        .unwrap();
        assert!(matches!(
            inject_environment(&mut manifest, &[], &[]),
            Err(ManifestError::MissingPodTemplate { .. })
        ));
    }
}
