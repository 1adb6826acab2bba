//! Kubernetes client operations used by the WorkflowRun controller

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::crd::{WorkflowRun, WorkflowRunStatus};
use crate::error::is_already_exists;
use crate::{Error, FIELD_MANAGER};

/// Result of creating a derived object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object did not exist and was created
    Created,
    /// An object with the same name already exists and is owned by the same run
    AlreadyOwned,
}

/// Trait abstracting Kubernetes client operations for WorkflowRun
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunClient: Send + Sync {
    /// Fetch a WorkflowRun, returning `None` if it no longer exists
    async fn get_run(&self, name: &str, namespace: &str) -> Result<Option<WorkflowRun>, Error>;

    /// Replace the status of a WorkflowRun
    ///
    /// The write is conditional on `run`'s resourceVersion and fails with
    /// [`Error::Conflict`] if the stored object has moved on.
    async fn patch_run_status(
        &self,
        run: &WorkflowRun,
        status: &WorkflowRunStatus,
    ) -> Result<(), Error>;

    /// Check whether the run's Deployment exists
    async fn deployment_exists(&self, name: &str, namespace: &str) -> Result<bool, Error>;

    /// Create the run's Service
    async fn create_service(&self, service: &Service) -> Result<CreateOutcome, Error>;

    /// Create the run's configuration bundle
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<CreateOutcome, Error>;

    /// Create the run's Deployment
    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome, Error>;
}

/// Real Kubernetes client implementation
pub struct RunClientImpl {
    client: Client,
}

impl RunClientImpl {
    /// Create a new RunClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn create<K>(&self, obj: &K) -> Result<CreateOutcome, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let kind = K::kind(&()).to_string();
        let name = obj.name_any();
        let namespace = obj
            .namespace()
            .ok_or_else(|| Error::create(&kind, &name, "object has no namespace"))?;

        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        match api.create(&params, obj).await {
            Ok(_) => {
                info!(%kind, %name, %namespace, "created");
                Ok(CreateOutcome::Created)
            }
            Err(e) if is_already_exists(&e) => {
                let existing = api.get(&name).await?;
                if shares_controller(obj.owner_references(), existing.owner_references()) {
                    debug!(%kind, %name, "already exists and owned by this run");
                    Ok(CreateOutcome::AlreadyOwned)
                } else {
                    Err(Error::create(
                        kind,
                        name,
                        "already exists and is not owned by this WorkflowRun",
                    ))
                }
            }
            Err(e) => Err(Error::create(kind, name, e.to_string())),
        }
    }
}

/// Returns true if `existing` carries the controller owner from `desired`
pub fn shares_controller(desired: &[OwnerReference], existing: &[OwnerReference]) -> bool {
    desired
        .iter()
        .filter(|o| o.controller == Some(true))
        .any(|owner| existing.iter().any(|o| o.uid == owner.uid))
}

#[async_trait]
impl RunClient for RunClientImpl {
    async fn get_run(&self, name: &str, namespace: &str) -> Result<Option<WorkflowRun>, Error> {
        let api: Api<WorkflowRun> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_run_status(
        &self,
        run: &WorkflowRun,
        status: &WorkflowRunStatus,
    ) -> Result<(), Error> {
        let name = run.name_any();
        let namespace = run.require_namespace()?;
        let api: Api<WorkflowRun> = Api::namespaced(self.client.clone(), &namespace);

        let status_patch = serde_json::json!({
            "metadata": { "resourceVersion": run.resource_version() },
            "status": status
        });

        api.patch_status(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await
        .map_err(|e| Error::from_kube("WorkflowRun", &name, e))?;

        Ok(())
    }

    async fn deployment_exists(&self, name: &str, namespace: &str) -> Result<bool, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.is_some())
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome, Error> {
        self.create(service).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<CreateOutcome, Error> {
        self.create(config_map).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome, Error> {
        self.create(deployment).await
    }
}
