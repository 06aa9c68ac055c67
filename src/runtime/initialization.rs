//! # Initialization
//!
//! Operator initialization logic including rustls setup, tracing, metrics,
//! config loading, and Kubernetes client setup.

use crate::cluster::KubeCluster;
use crate::config::{DeployConfig, OperatorConfig};
use crate::controller::batch::Deployer;
use crate::controller::reconciler::{ReconcilePolicy, Reconciler};
use crate::controller::templates::TemplateRegistry;
use crate::observability;
use crate::provider::{ClientOptions, ProviderRegistry};
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::Client;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything loaded before the server starts
pub struct InitializationResult {
    pub deploy_config: DeployConfig,
    pub operator_config: OperatorConfig,
    /// Templates indexed by kind and tier, immutable from here on
    pub templates: Arc<TemplateRegistry>,
    pub providers: ProviderRegistry,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("kustomizations", &self.deploy_config.kustomizations)
            .field("templates", &self.templates.len())
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}

/// Install the process-wide rustls crypto provider
///
/// Required by rustls 0.23+ before any TLS connection; a provider installed
/// earlier is kept.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Initialize the operator runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - Deploy config, template and provider loading
///
/// # Errors
///
/// Fails when the deploy config, the templates or a provider client can not be
/// loaded, or when tracing or metrics are already installed.
pub fn initialize(config_path: &Path) -> Result<InitializationResult> {
    // Configure rustls crypto provider FIRST, before any other operations
    install_crypto_provider();

    let operator_config = OperatorConfig::from_env();
    observability::init_tracing(&operator_config.log_level, &operator_config.log_format)
        .context("Failed to initialize tracing")?;

    info!("Starting Deploy Operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::register_metrics()?;

    let deploy_config = DeployConfig::load(config_path)
        .with_context(|| format!("Failed to load deploy config {}", config_path.display()))?;
    info!(
        "Deploy config loaded: templates={}, kustomizations={}",
        deploy_config.templates.display(),
        deploy_config.kustomizations.display()
    );

    let templates = TemplateRegistry::load(&deploy_config.templates).with_context(|| {
        format!(
            "Failed to load templates from {}",
            deploy_config.templates.display()
        )
    })?;
    info!("{} templates loaded", templates.len());

    let options = ClientOptions {
        timeout: operator_config.provider_timeout(),
        tag_filter: operator_config.tag_filter,
    };
    let providers = ProviderRegistry::from_config(&deploy_config.providers, &options)
        .context("Failed to create release providers")?;

    Ok(InitializationResult {
        deploy_config,
        operator_config,
        templates: Arc::new(templates),
        providers,
    })
}

/// Connect to the cluster and serve deploy requests
///
/// `port` overrides `server-port` of the deploy config.
///
/// # Errors
///
/// Fails when no Kubernetes client can be built or the server stops with an error.
pub async fn serve(init: InitializationResult, port: Option<u16>) -> Result<()> {
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let cluster = Arc::new(KubeCluster::new(client));

    let reconciler = Arc::new(Reconciler::new(
        init.templates,
        init.providers,
        cluster,
        ReconcilePolicy::from(&init.operator_config),
    ));
    let deployer = Deployer::new(
        reconciler,
        init.deploy_config.kustomizations.clone(),
        init.operator_config.max_services_per_request,
    );

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
        deployer,
    });

    // Templates and providers are loaded at this point
    server_state.is_ready.store(true, Ordering::Relaxed);

    let port = port.unwrap_or(init.deploy_config.server_port);
    start_server(port, init.deploy_config.tls_files(), server_state).await?;

    info!("Server stopped");
    Ok(())
}
