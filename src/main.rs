//! Maestro Operator - provisions workflow runs on Kubernetes

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Parser};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Config, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use maestro_operator::controller::{error_policy, reconcile, Context};
use maestro_operator::crd::{Agent, Workflow, WorkflowRun};
use maestro_operator::synthesizer::MANAGED_BY;
use maestro_operator::{DEFAULT_ENGINE_IMAGE, FIELD_MANAGER};

/// Maestro Operator - turns WorkflowRun resources into running workflow engines
#[derive(Parser, Debug)]
#[command(name = "maestro-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Out-of-cluster kubeconfig; in-cluster credentials are used if unset or missing
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Execution engine image run by every WorkflowRun
    #[arg(long, env = "MAESTRO_ENGINE_IMAGE", default_value = DEFAULT_ENGINE_IMAGE)]
    engine_image: String,

    /// Only watch WorkflowRuns in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Apply the CRDs with server-side apply at startup
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    install_crds: bool,

    /// Emit logs as JSON
    #[arg(long, env = "MAESTRO_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crds = [WorkflowRun::crd(), Workflow::crd(), Agent::crd()]
            .iter()
            .map(serde_yaml::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{}", crds.join("---\n"));
        return Ok(());
    }

    init_tracing(cli.log_json);
    run_controller(cli).await
}

/// Initialize tracing, honouring `RUST_LOG` when set
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,maestro_operator=debug,kube=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Create a kube client from the kubeconfig if it exists, else in-cluster config
async fn create_client(kubeconfig: Option<&Path>) -> anyhow::Result<Client> {
    let config = match kubeconfig.filter(|path| path.exists()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "using kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| anyhow::anyhow!("Failed to read kubeconfig {:?}: {}", path, e))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load kubeconfig: {}", e))?
        }
        None => {
            tracing::info!("using in-cluster configuration");
            Config::incluster()
                .map_err(|e| anyhow::anyhow!("Failed to load in-cluster config: {}", e))?
        }
    };
    Client::try_from(config).map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))
}

/// Ensure all Maestro CRDs are installed
///
/// Uses server-side apply so CRDs are created or updated to match this
/// binary's schema.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};
    use kube::ResourceExt;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in [WorkflowRun::crd(), Workflow::crd(), Agent::crd()] {
        let name = crd.name_any();
        tracing::info!(crd = %name, "installing CRD");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("All Maestro CRDs installed/updated");
    Ok(())
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the WorkflowRun controller until a shutdown signal arrives
async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    let client = create_client(cli.kubeconfig.as_deref()).await?;

    if cli.install_crds {
        ensure_crds_installed(&client).await?;
    }

    let namespace = cli.namespace.as_deref();
    let runs: Api<WorkflowRun> = scoped_api(&client, namespace);
    let deployments: Api<Deployment> = scoped_api(&client, namespace);
    let services: Api<Service> = scoped_api(&client, namespace);
    let config_maps: Api<ConfigMap> = scoped_api(&client, namespace);

    let owned = WatcherConfig::default().labels(&format!("app.kubernetes.io/managed-by={MANAGED_BY}"));

    let ctx = Arc::new(
        Context::builder(client.clone())
            .engine_image(cli.engine_image.clone())
            .build(),
    );

    tracing::info!(
        engine_image = %cli.engine_image,
        namespace = namespace.unwrap_or("<all>"),
        "starting WorkflowRun controller"
    );

    Controller::new(runs, WatcherConfig::default())
        .owns(deployments, owned.clone())
        .owns(services, owned.clone())
        .owns(config_maps, owned)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "WorkflowRun reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "WorkflowRun reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("controller shut down");
    Ok(())
}
