//! Maestro Operator - provisions workflow runs on Kubernetes
//!
//! A `WorkflowRun` names one `Workflow` and a list of `Agent` resources. The
//! operator resolves those definitions, bundles them into a ConfigMap and
//! starts a single-replica execution engine that reads the bundle at startup.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (WorkflowRun, Workflow, Agent)
//! - [`resolver`] - Fetches definitions generically and renders them as YAML
//! - [`conditions`] - Status condition bookkeeping for WorkflowRuns
//! - [`synthesizer`] - Builds the Service, ConfigMap and Deployment for a run
//! - [`controller`] - Kubernetes controller reconciliation logic
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod conditions;
pub mod controller;
pub mod crd;
pub mod error;
pub mod resolver;
pub mod synthesizer;

#[cfg(test)]
mod testing;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// API version shared by all maestro resources
pub const API_VERSION: &str = "v1alpha1";

/// Field manager name used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "maestro-operator";

/// Execution engine image used when neither the CLI nor the environment sets one
///
/// Overridable at build time through the `MAESTRO_ENGINE_IMAGE` environment variable.
pub const DEFAULT_ENGINE_IMAGE: &str = match option_env!("MAESTRO_ENGINE_IMAGE") {
    Some(image) => image,
    None => "localhost/maestro-engine:latest",
};

/// Port exposed by the workflow Service
pub const SERVICE_PORT: i32 = 80;

/// Port the execution engine listens on inside the pod
pub const ENGINE_PORT: i32 = 5000;

/// Path where the configuration bundle is mounted in the engine container
pub const CONFIG_MOUNT_PATH: &str = "/etc/config";

/// Requeue delay after a cycle that created resources
pub const REQUEUE_AFTER_CREATE_SECS: u64 = 60;

/// Requeue delay after a cycle with nothing to create
pub const REQUEUE_STEADY_SECS: u64 = 300;
