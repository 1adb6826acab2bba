//! Custom Resource Definitions for Maestro
//!
//! This module contains all CRD definitions used by the Maestro operator.

mod agent;
mod types;
mod workflow;
mod workflow_run;

pub use agent::{Agent, AgentSpec};
pub use types::{
    find_condition, set_condition, Condition, ConditionStatus, ConditionType, REASON_RECONCILING,
};
pub use workflow::{
    Event, Exception, Step, StepCondition, StepInput, StepLoop, TemplateMetadata, Workflow,
    WorkflowSpec, WorkflowTemplate,
};
pub use workflow_run::{WorkflowRun, WorkflowRunSpec, WorkflowRunStatus};
