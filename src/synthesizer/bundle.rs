//! Configuration bundle construction
//!
//! The bundle is a ConfigMap named after the run with two keys: `workflow`
//! holds the rendered Workflow and `agents` holds every rendered Agent, each
//! preceded by a document separator.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use crate::crd::WorkflowRunSpec;
use crate::resolver::{DefinitionKind, Resolver, DOCUMENT_SEPARATOR};
use crate::Error;

/// Bundle key holding the workflow document
pub const WORKFLOW_KEY: &str = "workflow";

/// Bundle key holding the agent documents
pub const AGENTS_KEY: &str = "agents";

/// Rendered definitions for one run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bundle {
    /// The workflow document
    pub workflow: String,
    /// Agent documents in the order the run lists them
    pub agents: Vec<String>,
}

impl Bundle {
    /// Concatenate agent documents, each preceded by the separator
    pub fn agents_document(&self) -> String {
        self.agents
            .iter()
            .map(|doc| format!("{DOCUMENT_SEPARATOR}{doc}"))
            .collect()
    }

    /// Build the ConfigMap carrying this bundle
    pub fn to_config_map(
        &self,
        name: &str,
        namespace: &str,
        labels: BTreeMap<String, String>,
        owner: OwnerReference,
    ) -> ConfigMap {
        let data = BTreeMap::from([
            (WORKFLOW_KEY.to_string(), self.workflow.clone()),
            (AGENTS_KEY.to_string(), self.agents_document()),
        ]);

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Resolve the workflow and every agent a run references
///
/// Resolution is fail-fast: the first definition that cannot be resolved
/// aborts the whole bundle.
pub async fn resolve_bundle(
    resolver: &Resolver,
    spec: &WorkflowRunSpec,
    namespace: &str,
) -> Result<Bundle, Error> {
    let workflow = resolver
        .resolve(DefinitionKind::Workflow, &spec.workflow, namespace)
        .await?;

    let mut agents = Vec::with_capacity(spec.agents.len());
    for agent in &spec.agents {
        agents.push(
            resolver
                .resolve(DefinitionKind::Agent, agent, namespace)
                .await?,
        );
    }

    Ok(Bundle { workflow, agents })
}
