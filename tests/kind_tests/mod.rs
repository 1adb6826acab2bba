//! Integration tests for the Maestro operator
//!
//! These tests require a Kubernetes cluster (kind) and tell the story of how
//! users submit workflow runs and what the operator builds for them.
//!
//! # Test Organization
//!
//! - `crd_operations`: creating and reading Workflow, Agent and WorkflowRun
//!   resources through the Kubernetes API
//!
//! - `run_provisioning`: driving `reconcile` against the cluster and checking
//!   the Service, ConfigMap and Deployment it creates
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --test-threads=1
//! ```

mod run_provisioning;
