//! Agent Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for an Agent
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    derive = "PartialEq",
    group = "maestro.ai4quantum.com",
    version = "v1alpha1",
    kind = "Agent",
    plural = "agents",
    namespaced,
    printcolumn = r#"{"name":"Framework","type":"string","jsonPath":".spec.framework"}"#,
    printcolumn = r#"{"name":"Model","type":"string","jsonPath":".spec.model"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// What the agent does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Execution framework (beeai, crewai, openai, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    /// Execution mode (local, remote)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Tools available to the agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// System instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Inline code for code agents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Input contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Output contract
    // Resources written by older tooling spell this "oputput".
    #[serde(default, alias = "oputput", skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Endpoint of a remote agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
