//! # Batch
//!
//! Walks the kustomization tree of one deploy request and reconciles every
//! file found, in file-name order.
//!
//! Paths are collected before anything is reconciled, so a batch over the
//! size cap fails without touching the cluster.

use crate::api::{DeployRequest, DeployResponse, ServiceResult};
use crate::controller::reconciler::Reconciler;
use crate::observability::metrics;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};
use walkdir::WalkDir;

/// Failure of the whole batch, reported as the top-level `errorDescription`
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Maximum number of services in one deployment call exceeded: {limit}")]
    LimitExceeded { limit: usize },
    #[error("invalid deployment path `{0}`: must be relative and must not contain `..`")]
    InvalidPath(String),
    #[error("error walk dir {path}: {message}")]
    Walk { path: String, message: String },
}

/// A file found under the kustomization root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    pub file: PathBuf,
    /// Path reported in the service result
    pub display_path: String,
}

/// Resolve the walk root of a request below `root`
///
/// # Errors
///
/// Returns [`BatchError::InvalidPath`] for absolute paths and paths containing `..`.
pub fn walk_root(root: &Path, sub_path: Option<&str>) -> Result<PathBuf, BatchError> {
    let Some(sub_path) = sub_path.filter(|p| !p.is_empty()) else {
        return Ok(root.to_path_buf());
    };
    let relative = Path::new(sub_path);
    let valid = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !valid {
        return Err(BatchError::InvalidPath(sub_path.to_string()));
    }
    Ok(root.join(relative))
}

/// Path reported for `file`: its parent directory relative to `root`, or the
/// file name when the file sits directly in `root`
#[must_use]
pub fn display_path(root: &Path, file: &Path) -> String {
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|relative| relative.to_string_lossy().into_owned())
        .filter(|relative| !relative.is_empty())
        .unwrap_or(file_name)
}

/// Collect every regular file under `start`, at most `limit` of them
///
/// # Errors
///
/// Returns [`BatchError::LimitExceeded`] when more than `limit` files are found and [`BatchError::Walk`] when the directory can not be read.
pub fn collect_descriptors(
    root: &Path,
    start: &Path,
    limit: usize,
) -> Result<Vec<DescriptorFile>, BatchError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(start).sort_by_file_name() {
        let entry = entry.map_err(|e| BatchError::Walk {
            path: e
                .path()
                .unwrap_or(start)
                .display()
                .to_string(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if files.len() >= limit {
            return Err(BatchError::LimitExceeded { limit });
        }
        files.push(DescriptorFile {
            display_path: display_path(root, entry.path()),
            file: entry.into_path(),
        });
    }
    Ok(files)
}

/// Serves deploy requests against one kustomization root
#[derive(Debug, Clone)]
pub struct Deployer {
    reconciler: Arc<Reconciler>,
    root: PathBuf,
    max_services: usize,
}

impl Deployer {
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler>, root: PathBuf, max_services: usize) -> Self {
        Self {
            reconciler,
            root,
            max_services,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn deploy(&self, request: &DeployRequest) -> DeployResponse {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "deploy",
            request_id = %request_id,
            path = request.path.as_deref().unwrap_or(""),
            recreate = request.recreate,
            mode = %request.mode,
        );
        let start = Instant::now();
        metrics::increment_deploy_requests();

        let response = match self.run(request).instrument(span.clone()).await {
            Ok(services) => {
                span.in_scope(|| info!("Deploy finished: {} service(s)", services.len()));
                DeployResponse::Services(services)
            }
            Err(e) => {
                span.in_scope(|| error!("Deploy failed: {}", e));
                metrics::increment_deploy_request_errors();
                DeployResponse::ErrorDescription(e.to_string())
            }
        };
        metrics::observe_deploy_duration(start.elapsed().as_secs_f64());
        response
    }

    async fn run(&self, request: &DeployRequest) -> Result<Vec<ServiceResult>, BatchError> {
        let start = walk_root(&self.root, request.path.as_deref())?;
        info!("request {} recreate={}", start.display(), request.recreate);

        let files = collect_descriptors(&self.root, &start, self.max_services)?;
        let mut services = Vec::with_capacity(files.len());
        for descriptor in files {
            let result = self
                .reconciler
                .reconcile_file(
                    &descriptor.file,
                    descriptor.display_path,
                    request.recreate,
                    request.mode,
                )
                .await;
            services.push(result);
        }
        Ok(services)
    }
}
