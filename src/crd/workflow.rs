//! Workflow Custom Resource Definition
//!
//! The operator never interprets a Workflow. It only reads it and hands the
//! rendered document to the execution engine, so every field is optional.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a Workflow
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    derive = "PartialEq",
    group = "maestro.ai4quantum.com",
    version = "v1alpha1",
    kind = "Workflow",
    plural = "workflows",
    shortname = "wf",
    namespaced,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// The workflow body
    #[serde(default)]
    pub template: WorkflowTemplate,
}

/// Body of a workflow definition
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    /// Free-form identification for the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,

    /// Event that triggers the workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,

    /// Agents participating in the workflow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,

    /// Handler invoked when a step raises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exception>,

    /// Initial prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Ordered steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

/// Name and labels carried inside the template
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    /// Workflow display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arbitrary labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Arbitrary annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Triggering event
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Event {
    /// Cron schedule expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    /// Event name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Agent that fires the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Steps run when the event fires
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    /// Exit condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,
}

/// Exception handler
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Exception {
    /// Handler name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Agent that handles the exception
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// One workflow step
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Step {
    /// Step name, referenced by loops, conditions and parallel groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Agent executing the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Step input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<StepInput>,

    /// Repeat the step until a condition holds
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_: Option<StepLoop>,

    /// Branches evaluated after the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition: Vec<StepCondition>,

    /// Steps run concurrently
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel: Vec<String>,
}

/// Input of a step
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct StepInput {
    /// Literal prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Template reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Loop of a step
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct StepLoop {
    /// Agent run on each iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Exit condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

/// Branch condition of a step
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct StepCondition {
    /// Predicate
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub if_: Option<String>,
    /// Step taken when the predicate holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<String>,
    /// Step taken otherwise
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub else_: Option<String>,
    /// Case label
    #[serde(rename = "case", default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    /// Step taken for the case
    #[serde(rename = "do", default, skip_serializing_if = "Option::is_none")]
    pub do_: Option<String>,
    /// Step taken when no case matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}
