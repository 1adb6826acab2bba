//! WorkflowRun controller implementation
//!
//! Each cycle fetches the run, makes sure it carries a baseline condition and,
//! if its Deployment does not exist yet, synthesizes and creates the Service,
//! configuration bundle and Deployment. Existing Deployments are left alone.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::client::{CreateOutcome, RunClient, RunClientImpl};
use crate::conditions::ConditionTracker;
use crate::crd::{ConditionType, WorkflowRun};
use crate::resolver::{DefinitionSourceImpl, Resolver};
use crate::synthesizer::Synthesizer;
use crate::{Error, DEFAULT_ENGINE_IMAGE, REQUEUE_AFTER_CREATE_SECS, REQUEUE_STEADY_SECS};

/// Backoff after a failed cycle that may succeed on retry
const ERROR_REQUEUE_SECS: u64 = 5;

/// Controller context containing shared state and clients
pub struct Context {
    /// Client for runs and derived objects
    pub kube: Arc<dyn RunClient>,
    /// Builds derived objects for runs
    pub synthesizer: Synthesizer,
}

impl Context {
    /// Create a builder with real kube-backed clients
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context with explicit clients (used by tests)
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn RunClient>,
        definitions: Arc<dyn crate::resolver::DefinitionSource>,
        engine_image: &str,
    ) -> Self {
        Self {
            kube,
            synthesizer: Synthesizer::new(Resolver::new(definitions), engine_image),
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .engine_image("registry.local/maestro-engine:0.3")
///     .build();
/// ```
pub struct ContextBuilder {
    client: Client,
    engine_image: String,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            engine_image: DEFAULT_ENGINE_IMAGE.to_string(),
        }
    }

    /// Set the execution engine image
    pub fn engine_image(mut self, image: impl Into<String>) -> Self {
        self.engine_image = image.into();
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let definitions = Arc::new(DefinitionSourceImpl::new(self.client.clone()));
        Context {
            kube: Arc::new(RunClientImpl::new(self.client)),
            synthesizer: Synthesizer::new(Resolver::new(definitions), self.engine_image),
        }
    }
}

/// Reconcile a WorkflowRun resource
///
/// Returns a requeue after [`REQUEUE_AFTER_CREATE_SECS`] when this cycle
/// created the run's resources and after [`REQUEUE_STEADY_SECS`] otherwise.
#[instrument(skip(run, ctx), fields(run = %run.name_any(), namespace = %run.namespace().unwrap_or_default()))]
pub async fn reconcile(run: Arc<WorkflowRun>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = run.name_any();
    let namespace = run.require_namespace()?;
    info!("reconciling workflow run");

    let Some(mut current) = ctx.kube.get_run(&name, &namespace).await? else {
        debug!("workflow run no longer exists");
        return Ok(Action::await_change());
    };

    let tracker = ConditionTracker::new(ctx.kube.as_ref());
    if tracker.ensure_initial_condition(&mut current).await? {
        debug!("initial condition recorded");
    }

    if ctx.kube.deployment_exists(&name, &namespace).await? {
        debug!("deployment already exists");
        return Ok(Action::requeue(Duration::from_secs(REQUEUE_STEADY_SECS)));
    }

    if let Err(e) = provision(&current, &ctx).await {
        warn!(error = %e, "failed to provision workflow run");
        let message = format!("Failed to create Deployment for WorkflowRun ({name}): ({e})");
        if let Err(status_err) = tracker
            .set_condition(&mut current, ConditionType::Available, &message)
            .await
        {
            warn!(error = %status_err, "failed to record provisioning failure");
        }
        return Err(e);
    }

    tracker
        .set_condition(
            &mut current,
            ConditionType::Progressing,
            &format!("Created Deployment for the WorkflowRun: ({name})"),
        )
        .await?;

    info!("workflow run provisioned");
    Ok(Action::requeue(Duration::from_secs(
        REQUEUE_AFTER_CREATE_SECS,
    )))
}

/// Synthesize and create the Service, bundle and Deployment
///
/// Any failure aborts the cycle, including the bundle: a Deployment without
/// its ConfigMap cannot start.
async fn provision(run: &WorkflowRun, ctx: &Context) -> Result<(), Error> {
    run.spec.validate()?;
    let resources = ctx.synthesizer.synthesize(run).await?;

    let outcome = ctx.kube.create_service(&resources.service).await?;
    log_outcome("Service", outcome);

    let outcome = ctx.kube.create_config_map(&resources.config_map).await?;
    log_outcome("ConfigMap", outcome);

    let outcome = ctx.kube.create_deployment(&resources.deployment).await?;
    log_outcome("Deployment", outcome);

    Ok(())
}

fn log_outcome(kind: &str, outcome: CreateOutcome) {
    match outcome {
        CreateOutcome::Created => info!(kind, "created"),
        CreateOutcome::AlreadyOwned => debug!(kind, "already present from an earlier cycle"),
    }
}

/// Error policy for the controller
///
/// Retryable errors requeue after a short backoff. Errors that need a change
/// to the run or its definitions wait for the steady interval instead.
pub fn error_policy(run: Arc<WorkflowRun>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        run = %run.name_any(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(ERROR_REQUEUE_SECS))
    } else {
        Action::requeue(Duration::from_secs(REQUEUE_STEADY_SECS))
    }
}
