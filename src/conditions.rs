//! Status condition tracking for WorkflowRuns
//!
//! Every write goes to the status subresource and is followed by a fresh read,
//! so the caller's copy always carries the latest resourceVersion. A write
//! based on a stale copy is rejected by the API server as a conflict.

use kube::ResourceExt;
use tracing::debug;

use crate::controller::RunClient;
use crate::crd::{set_condition, Condition, ConditionType, WorkflowRun};
use crate::Error;

/// Message of the condition written the first time a run is seen
pub const INITIAL_MESSAGE: &str = "Starting reconciliation";

/// Records progress conditions on a WorkflowRun
pub struct ConditionTracker<'a> {
    client: &'a dyn RunClient,
}

impl<'a> ConditionTracker<'a> {
    /// Create a tracker writing through the given client
    pub fn new(client: &'a dyn RunClient) -> Self {
        Self { client }
    }

    /// Merge an `Unknown`/`Reconciling` condition of the given type into the
    /// run's status, persist it and refresh `run` from the API server
    pub async fn set_condition(
        &self,
        run: &mut WorkflowRun,
        type_: ConditionType,
        message: &str,
    ) -> Result<(), Error> {
        let name = run.name_any();
        let namespace = run.require_namespace()?;

        let mut status = run.status.clone().unwrap_or_default();
        set_condition(
            &mut status.conditions,
            Condition::progress(type_, message).observed_generation(run.metadata.generation),
        );

        self.client.patch_run_status(run, &status).await?;
        debug!(run = %name, condition = %type_, message, "status condition written");

        *run = self
            .client
            .get_run(&name, &namespace)
            .await?
            .ok_or_else(|| Error::not_found("WorkflowRun", &name))?;

        Ok(())
    }

    /// Write the initial `Available` condition unless the run already has one
    ///
    /// Returns true if a condition was written.
    pub async fn ensure_initial_condition(&self, run: &mut WorkflowRun) -> Result<bool, Error> {
        if !run.conditions().is_empty() {
            return Ok(false);
        }
        self.set_condition(run, ConditionType::Available, INITIAL_MESSAGE)
            .await?;
        Ok(true)
    }
}
