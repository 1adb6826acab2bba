//! Definition resolution
//!
//! Workflows and Agents referenced by a run are looked up as untyped
//! [`DynamicObject`]s, converted into their typed CRD form and rendered as YAML
//! documents for the execution engine.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject};
use kube::discovery::ApiResource;
use kube::Client;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{Agent, Workflow};
use crate::Error;

/// Marker written before every agent document in the bundle
pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Kinds of definition a run can reference
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DefinitionKind {
    /// A `Workflow` resource
    Workflow,
    /// An `Agent` resource
    Agent,
}

impl DefinitionKind {
    /// Kind name as it appears in `kind:` and in errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Workflow => "Workflow",
            Self::Agent => "Agent",
        }
    }

    /// API resource used for untyped lookup
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Self::Workflow => ApiResource::erase::<Workflow>(&()),
            Self::Agent => ApiResource::erase::<Agent>(&()),
        }
    }
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// A resolved, strongly typed definition
#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    /// Resolved Workflow
    Workflow(Workflow),
    /// Resolved Agent
    Agent(Agent),
}

impl Definition {
    /// Render the definition as a single YAML document
    pub fn to_yaml(&self) -> Result<String, Error> {
        match self {
            Self::Workflow(wf) => render(wf),
            Self::Agent(agent) => render(agent),
        }
    }
}

fn render<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_yaml::to_string(value).map_err(|e| Error::serialization(e.to_string()))
}

/// Trait abstracting untyped definition lookup
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// Fetch a definition by kind, name and namespace
    ///
    /// Returns `Ok(None)` when the object does not exist.
    async fn get_definition(
        &self,
        kind: DefinitionKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>, Error>;
}

/// Real definition source backed by the Kubernetes API
pub struct DefinitionSourceImpl {
    client: Client,
}

impl DefinitionSourceImpl {
    /// Create a new DefinitionSourceImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DefinitionSource for DefinitionSourceImpl {
    async fn get_definition(
        &self,
        kind: DefinitionKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        let ar = kind.api_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        Ok(api.get_opt(name).await?)
    }
}

/// Resolves definitions through a [`DefinitionSource`]
#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn DefinitionSource>,
}

impl Resolver {
    /// Create a resolver over the given source
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        Self { source }
    }

    /// Fetch and convert a definition to its typed form
    pub async fn fetch(
        &self,
        kind: DefinitionKind,
        name: &str,
        namespace: &str,
    ) -> Result<Definition, Error> {
        let obj = self
            .source
            .get_definition(kind, name, namespace)
            .await?
            .ok_or_else(|| Error::not_found(kind.kind(), name))?;

        convert(kind, name, obj)
    }

    /// Fetch a definition and render it as a YAML document
    pub async fn resolve(
        &self,
        kind: DefinitionKind,
        name: &str,
        namespace: &str,
    ) -> Result<String, Error> {
        let definition = self.fetch(kind, name, namespace).await?;
        let document = definition.to_yaml()?;
        debug!(%kind, name, bytes = document.len(), "resolved definition");
        Ok(document)
    }
}

/// Convert an untyped object into its typed definition
///
/// Server-populated metadata is dropped so the rendered document depends only
/// on what the author wrote.
pub fn convert(kind: DefinitionKind, name: &str, obj: DynamicObject) -> Result<Definition, Error> {
    let value = serde_json::to_value(&obj).map_err(|e| Error::serialization(e.to_string()))?;

    let definition = match kind {
        DefinitionKind::Workflow => {
            let mut wf: Workflow = serde_json::from_value(value)
                .map_err(|e| Error::conversion(kind.kind(), name, e.to_string()))?;
            strip_server_fields(&mut wf.metadata);
            Definition::Workflow(wf)
        }
        DefinitionKind::Agent => {
            let mut agent: Agent = serde_json::from_value(value)
                .map_err(|e| Error::conversion(kind.kind(), name, e.to_string()))?;
            strip_server_fields(&mut agent.metadata);
            Definition::Agent(agent)
        }
    };

    Ok(definition)
}

fn strip_server_fields(meta: &mut k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) {
    meta.managed_fields = None;
    meta.resource_version = None;
    meta.uid = None;
    meta.generation = None;
    meta.creation_timestamp = None;
}
