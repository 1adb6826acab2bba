//! Resource synthesis for WorkflowRuns
//!
//! Computes the desired Service, configuration bundle and Deployment for a
//! run. Synthesis reads definitions but never writes to the cluster; the
//! controller decides what to create.

mod bundle;
mod workload;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use tracing::debug;

use crate::crd::WorkflowRun;
use crate::resolver::Resolver;
use crate::{Error, API_VERSION};

pub use bundle::{resolve_bundle, Bundle, AGENTS_KEY, WORKFLOW_KEY};
pub use workload::{
    build_deployment, build_service, env_from_sources, INSTANCE_LABEL, LOG_LEVEL_ENV,
};

/// Value of `app.kubernetes.io/managed-by` on every derived object
pub const MANAGED_BY: &str = "maestro-operator";

/// Desired derived objects for one run
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesizedResources {
    /// Service exposing the engine
    pub service: Service,
    /// ConfigMap holding the rendered definitions
    pub config_map: ConfigMap,
    /// Deployment running the engine
    pub deployment: Deployment,
}

/// Standard labels for the objects of one run
pub fn standard_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "WorkflowRun".to_string()),
        (INSTANCE_LABEL.to_string(), name.to_string()),
        ("app.kubernetes.io/version".to_string(), API_VERSION.to_string()),
        (
            "app.kubernetes.io/part-of".to_string(),
            "workflow-operator".to_string(),
        ),
        ("app.kubernetes.io/managed-by".to_string(), MANAGED_BY.to_string()),
    ])
}

/// Controller owner reference pointing at the run
///
/// Blocks owner deletion so foreground deletion of the run waits for its
/// derived objects. Fails if the run has not been persisted yet and so has no uid.
pub fn owner_reference(run: &WorkflowRun) -> Result<OwnerReference, Error> {
    let owner = run.controller_owner_ref(&()).ok_or_else(|| {
        Error::owner_link(format!(
            "WorkflowRun {} has no uid; cannot own derived objects",
            run.name_any()
        ))
    })?;
    Ok(OwnerReference {
        block_owner_deletion: Some(true),
        ..owner
    })
}

/// Builds the derived objects for runs
#[derive(Clone)]
pub struct Synthesizer {
    resolver: Resolver,
    engine_image: String,
}

impl Synthesizer {
    /// Create a synthesizer resolving definitions through `resolver`
    pub fn new(resolver: Resolver, engine_image: impl Into<String>) -> Self {
        Self {
            resolver,
            engine_image: engine_image.into(),
        }
    }

    /// Compute the Service, ConfigMap and Deployment for `run`
    pub async fn synthesize(&self, run: &WorkflowRun) -> Result<SynthesizedResources, Error> {
        let name = run.name_any();
        let namespace = run.require_namespace()?;
        let owner = owner_reference(run)?;
        let labels = standard_labels(&name);

        let bundle = resolve_bundle(&self.resolver, &run.spec, &namespace).await?;
        debug!(run = %name, agents = bundle.agents.len(), "bundle resolved");

        Ok(SynthesizedResources {
            service: build_service(&run.spec, &name, &namespace, labels.clone(), owner.clone()),
            config_map: bundle.to_config_map(&name, &namespace, labels.clone(), owner.clone()),
            deployment: build_deployment(
                &run.spec,
                &name,
                &namespace,
                &self.engine_image,
                labels,
                owner,
            ),
        })
    }
}
