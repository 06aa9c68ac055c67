//! # Deploy Operator
//!
//! Serves deploy requests: walks a tree of `kustomization.yaml` descriptors,
//! resolves the latest release of every workload from GitHub or GitLab and
//! reconciles the rendered manifest against the cluster.
//!
//! ## Overview
//!
//! 1. **Templates** - manifest templates are loaded once at startup, keyed by kind and tier
//! 2. **Release providers** - one client per configured GitHub/GitLab host
//! 3. **Deploy API** - `POST /api/v1/deploy` reconciles every descriptor under a path
//! 4. **Probes and metrics** - `/healthz`, `/readyz` and `/metrics`
//!
//! ## Usage
//!
//! ```text
//! deploy-operator --config /etc/deploy/config.yaml
//! deploy-operator --config ./config.yaml --check
//! ```

use anyhow::Result;
use clap::Parser;
use deploy_operator::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use deploy_operator::runtime;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "deploy-operator")]
#[command(about = "Reconciles kustomization descriptors against a Kubernetes cluster", long_about = None)]
struct Cli {
    /// Path of the deploy config file
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen port, overrides `server-port` of the config file
    #[arg(long)]
    port: Option<u16>,

    /// Load config, templates and providers, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let init = runtime::initialize(&cli.config)?;

    if cli.check {
        info!(
            "Configuration OK: {} templates, {} release providers",
            init.templates.len(),
            init.providers.len()
        );
        return Ok(());
    }

    runtime::serve(init, cli.port).await
}
