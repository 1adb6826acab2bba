//! In-memory cluster used by unit tests
//!
//! Stores runs, derived objects and definitions behind mutexes and enforces
//! resourceVersion checks on status writes the way the API server does.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};

use crate::controller::{shares_controller, CreateOutcome, RunClient};
use crate::crd::{WorkflowRun, WorkflowRunSpec, WorkflowRunStatus};
use crate::resolver::{DefinitionKind, DefinitionSource};
use crate::Error;

type Key = (String, String);

/// Build a persisted-looking run in the `default` namespace
pub fn sample_run(name: &str, workflow: &str, agents: &[&str]) -> WorkflowRun {
    WorkflowRun {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{name}")),
            generation: Some(1),
            ..Default::default()
        },
        spec: WorkflowRunSpec {
            workflow: workflow.to_string(),
            agents: agents.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        },
        status: None,
    }
}

fn definition_object(kind: DefinitionKind, name: &str, namespace: &str) -> DynamicObject {
    let spec = match kind {
        DefinitionKind::Workflow => serde_json::json!({
            "template": {
                "prompt": format!("run {name}"),
                "steps": [{ "name": "only", "agent": "a1" }]
            }
        }),
        DefinitionKind::Agent => serde_json::json!({
            "framework": "beeai",
            "model": "llama3.1",
            "description": format!("agent {name}")
        }),
    };
    let mut obj = DynamicObject::new(name, &kind.api_resource()).within(namespace);
    obj.data = serde_json::json!({ "spec": spec });
    obj
}

#[derive(Default)]
struct State {
    runs: BTreeMap<Key, WorkflowRun>,
    services: BTreeMap<Key, Service>,
    config_maps: BTreeMap<Key, ConfigMap>,
    deployments: BTreeMap<Key, Deployment>,
    definitions: BTreeMap<(DefinitionKind, String, String), DynamicObject>,
    failing_kinds: HashSet<String>,
    status_writes: usize,
    next_version: u64,
}

/// Fake cluster implementing both client traits
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    /// Empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster holding one Workflow and the given Agents in `default`
    pub fn with_definitions(workflow: &str, agents: &[&str]) -> Self {
        Self::with_definitions_in("default", workflow, agents)
    }

    /// Cluster holding one Workflow and the given Agents in `namespace`
    pub fn with_definitions_in(namespace: &str, workflow: &str, agents: &[&str]) -> Self {
        let cluster = Self::new();
        cluster.add_definition(DefinitionKind::Workflow, workflow, namespace);
        for agent in agents {
            cluster.add_definition(DefinitionKind::Agent, agent, namespace);
        }
        cluster
    }

    /// Store a definition
    pub fn add_definition(&self, kind: DefinitionKind, name: &str, namespace: &str) {
        self.state.lock().unwrap().definitions.insert(
            (kind, namespace.to_string(), name.to_string()),
            definition_object(kind, name, namespace),
        );
    }

    /// Make every create of the given kind fail
    pub fn fail_creates_of(&self, kind: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_kinds
            .insert(kind.to_string());
    }

    /// Persist a run and return the stored copy
    pub fn insert_run(&self, mut run: WorkflowRun) -> WorkflowRun {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        run.metadata.resource_version = Some(state.next_version.to_string());
        state.runs.insert(key_of(&run), run.clone());
        run
    }

    /// Remove a run
    pub fn delete_run(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .runs
            .remove(&("default".to_string(), name.to_string()));
    }

    /// Stored run in `default`
    pub fn run(&self, name: &str) -> Option<WorkflowRun> {
        self.state
            .lock()
            .unwrap()
            .runs
            .get(&("default".to_string(), name.to_string()))
            .cloned()
    }

    /// Number of successful status writes
    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }

    /// Stored Services
    pub fn services(&self) -> Vec<Service> {
        self.state.lock().unwrap().services.values().cloned().collect()
    }

    /// Stored ConfigMaps
    pub fn config_maps(&self) -> Vec<ConfigMap> {
        self.state
            .lock()
            .unwrap()
            .config_maps
            .values()
            .cloned()
            .collect()
    }

    /// Stored Deployments
    pub fn deployments(&self) -> Vec<Deployment> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .values()
            .cloned()
            .collect()
    }

    /// Total number of derived objects
    pub fn object_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.services.len() + state.config_maps.len() + state.deployments.len()
    }

    /// Store a Deployment directly, as if left behind by an earlier cycle
    pub fn insert_deployment(&self, deployment: Deployment) {
        let key = key_of(&deployment);
        self.state.lock().unwrap().deployments.insert(key, deployment);
    }

    /// Store a Service directly
    pub fn insert_service(&self, service: Service) {
        let key = key_of(&service);
        self.state.lock().unwrap().services.insert(key, service);
    }
}

fn key_of<K: Resource>(obj: &K) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

fn create_in<K>(
    store: &mut BTreeMap<Key, K>,
    failing: &HashSet<String>,
    obj: &K,
) -> Result<CreateOutcome, Error>
where
    K: Resource<DynamicType = ()> + Clone,
{
    let kind = K::kind(&()).to_string();
    let key = key_of(obj);
    if failing.contains(&kind) {
        return Err(Error::create(kind, key.1, "injected failure"));
    }
    match store.get(&key) {
        Some(existing) if shares_controller(obj.owner_references(), existing.owner_references()) => {
            Ok(CreateOutcome::AlreadyOwned)
        }
        Some(_) => Err(Error::create(
            kind,
            key.1,
            "already exists and is not owned by this WorkflowRun",
        )),
        None => {
            store.insert(key, obj.clone());
            Ok(CreateOutcome::Created)
        }
    }
}

#[async_trait]
impl RunClient for FakeCluster {
    async fn get_run(&self, name: &str, namespace: &str) -> Result<Option<WorkflowRun>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .runs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn patch_run_status(
        &self,
        run: &WorkflowRun,
        status: &WorkflowRunStatus,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version = state.next_version.to_string();
        let name = run.name_any();

        let stored = state
            .runs
            .get_mut(&key_of(run))
            .ok_or_else(|| Error::not_found("WorkflowRun", &name))?;
        if stored.metadata.resource_version != run.metadata.resource_version {
            return Err(Error::conflict("WorkflowRun", name));
        }
        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(version);
        state.status_writes += 1;
        Ok(())
    }

    async fn deployment_exists(&self, name: &str, namespace: &str) -> Result<bool, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deployments
            .contains_key(&(namespace.to_string(), name.to_string())))
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome, Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        create_in(&mut state.services, &state.failing_kinds, service)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<CreateOutcome, Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        create_in(&mut state.config_maps, &state.failing_kinds, config_map)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome, Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        create_in(&mut state.deployments, &state.failing_kinds, deployment)
    }
}

#[async_trait]
impl DefinitionSource for FakeCluster {
    async fn get_definition(
        &self,
        kind: DefinitionKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .definitions
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }
}
