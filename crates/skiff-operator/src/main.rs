//! Skiff Operator - reconciles SkiffApp records into Deployments and Services

use clap::Parser;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skiff_common::crd::SkiffApp;
use skiff_common::FIELD_MANAGER;
use skiff_operator::runner;

/// Skiff - CRD-driven operator for replicated app services
#[derive(Parser, Debug)]
#[command(name = "skiff-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let crd = serde_yaml::to_string(&SkiffApp::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let client = Client::try_default().await?;
    ensure_crds_installed(&client).await?;

    tracing::info!("Starting controllers:");
    runner::build_app_controller(client).await;

    tracing::info!("Controller stopped, exiting");
    Ok(())
}

/// Ensure the SkiffApp CRD is installed
///
/// The operator installs its own CRD on startup using server-side apply.
/// This ensures the CRD version always matches the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing SkiffApp CRD...");
    crds.patch("skiffapps.skiff.dev", &params, &Patch::Apply(&SkiffApp::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install SkiffApp CRD: {}", e))?;

    Ok(())
}
