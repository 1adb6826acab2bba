//! WorkflowRun Custom Resource Definition
//!
//! A WorkflowRun asks the operator to run one Workflow with a set of Agents.
//! The operator answers by creating a Service, a ConfigMap and a Deployment,
//! all owned by the run.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{set_condition, Condition};

/// Specification for a WorkflowRun
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "maestro.ai4quantum.com",
    version = "v1alpha1",
    kind = "WorkflowRun",
    plural = "workflowruns",
    shortname = "wfr",
    status = "WorkflowRunStatus",
    namespaced,
    printcolumn = r#"{"name":"Workflow","type":"string","jsonPath":".spec.workflow"}"#,
    printcolumn = r#"{"name":"NodePort","type":"integer","jsonPath":".spec.nodeport"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunSpec {
    /// Names of Agent resources in the run's namespace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,

    /// Name of the Workflow resource in the run's namespace
    #[serde(default)]
    pub workflow: String,

    /// Log level handed to the execution engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loglevel: Option<String>,

    /// Secret imported whole as container environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<String>,

    /// ConfigMap imported whole as container environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environments: Option<String>,

    /// Fixed NodePort for the Service, 0 keeps it cluster-internal
    #[serde(default, skip_serializing_if = "is_zero")]
    pub nodeport: i32,
}

fn is_zero(port: &i32) -> bool {
    *port == 0
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl WorkflowRunSpec {
    /// Secret to import as environment, if any
    pub fn secrets_name(&self) -> Option<&str> {
        non_empty(&self.secrets)
    }

    /// ConfigMap to import as environment, if any
    pub fn environments_name(&self) -> Option<&str> {
        non_empty(&self.environments)
    }

    /// Log level for the execution engine, if any
    pub fn log_level(&self) -> Option<&str> {
        non_empty(&self.loglevel)
    }

    /// External port for the Service, if any
    pub fn node_port(&self) -> Option<i32> {
        (self.nodeport != 0).then_some(self.nodeport)
    }

    /// Check the fields a run must carry before it can be provisioned
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.workflow.is_empty() {
            return Err(crate::Error::validation("spec.workflow must name a Workflow"));
        }
        if let Some(agent) = self.agents.iter().find(|a| a.is_empty()) {
            return Err(crate::Error::validation(format!(
                "spec.agents contains an empty name: {agent:?}"
            )));
        }
        if !(0..=65535).contains(&self.nodeport) {
            return Err(crate::Error::validation(format!(
                "spec.nodeport {} is not a valid port",
                self.nodeport
            )));
        }
        Ok(())
    }
}

/// Status for a WorkflowRun
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunStatus {
    /// Conditions narrating reconciliation progress, one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl WorkflowRunStatus {
    /// Merge a condition into the status (builder pattern)
    pub fn condition(mut self, condition: Condition) -> Self {
        set_condition(&mut self.conditions, condition);
        self
    }
}

impl WorkflowRun {
    /// Conditions currently recorded on the run
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Namespace of the run, which every derived object shares
    pub fn require_namespace(&self) -> Result<String, crate::Error> {
        self.namespace().ok_or_else(|| {
            crate::Error::validation(format!("WorkflowRun {} has no namespace", self.name_any()))
        })
    }
}
