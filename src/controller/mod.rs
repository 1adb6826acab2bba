//! Controller implementation for WorkflowRun
//!
//! This module contains the reconciliation logic and the Kubernetes client
//! seam it runs against.

mod client;
mod workflow_run;

#[cfg(test)]
pub use client::MockRunClient;
pub use client::{shares_controller, CreateOutcome, RunClient, RunClientImpl};
pub use workflow_run::{error_policy, reconcile, Context, ContextBuilder};
