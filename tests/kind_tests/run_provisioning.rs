//! Integration tests for WorkflowRun provisioning
//!
//! `reconcile` is driven directly against the cluster so each story can check
//! the derived objects without a running operator.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;

use maestro_operator::controller::{reconcile, Context};
use maestro_operator::crd::{find_condition, Agent, Workflow, WorkflowRun};
use maestro_operator::synthesizer::AGENTS_KEY;

use super::helpers::{
    cleanup, ensure_test_cluster, sample_agent, sample_run, sample_workflow, TEST_NAMESPACE,
};

async fn cleanup_all(client: &kube::Client, run: &str, workflow: &str, agents: &[&str]) {
    cleanup::<WorkflowRun>(client, run).await;
    cleanup::<Deployment>(client, run).await;
    cleanup::<Service>(client, run).await;
    cleanup::<ConfigMap>(client, run).await;
    cleanup::<Workflow>(client, workflow).await;
    for agent in agents {
        cleanup::<Agent>(client, agent).await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
}

/// Story: A run with two agents becomes a Service, bundle and Deployment
///
/// Expected behavior:
/// - The first reconcile creates all three objects and requeues quickly
/// - The bundle carries one document per agent
/// - A second reconcile creates nothing and requeues slowly
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_run_is_provisioned_once() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let agents = ["it-a1", "it-a2"];
    cleanup_all(&client, "it-demo", "it-wf", &agents).await;

    let pp = PostParams::default();
    Api::<Workflow>::namespaced(client.clone(), TEST_NAMESPACE)
        .create(&pp, &sample_workflow("it-wf", &agents))
        .await
        .expect("failed to create workflow");
    for agent in agents {
        Api::<Agent>::namespaced(client.clone(), TEST_NAMESPACE)
            .create(&pp, &sample_agent(agent))
            .await
            .expect("failed to create agent");
    }
    let runs: Api<WorkflowRun> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let run = runs
        .create(&pp, &sample_run("it-demo", "it-wf", &agents))
        .await
        .expect("failed to create run");

    let ctx = Arc::new(Context::builder(client.clone()).build());

    let action = reconcile(Arc::new(run), ctx.clone())
        .await
        .expect("first reconcile failed");
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));

    let cm = Api::<ConfigMap>::namespaced(client.clone(), TEST_NAMESPACE)
        .get("it-demo")
        .await
        .expect("bundle missing");
    let agents_doc = &cm.data.expect("bundle has data")[AGENTS_KEY];
    assert_eq!(agents_doc.matches("---\n").count(), 2);

    Api::<Service>::namespaced(client.clone(), TEST_NAMESPACE)
        .get("it-demo")
        .await
        .expect("service missing");
    Api::<Deployment>::namespaced(client.clone(), TEST_NAMESPACE)
        .get("it-demo")
        .await
        .expect("deployment missing");

    let stored = runs.get("it-demo").await.expect("run missing");
    assert!(find_condition(stored.conditions(), "Progressing").is_some());

    let action = reconcile(Arc::new(stored), ctx)
        .await
        .expect("second reconcile failed");
    assert_eq!(action, Action::requeue(Duration::from_secs(300)));

    cleanup_all(&client, "it-demo", "it-wf", &agents).await;
}

/// Story: A run naming a missing agent is refused
///
/// Expected behavior:
/// - reconcile returns an error
/// - No Deployment is created
/// - The run's Available condition explains the failure
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_missing_agent_blocks_run() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    cleanup_all(&client, "it-broken", "it-wf2", &["it-b1"]).await;

    let pp = PostParams::default();
    Api::<Workflow>::namespaced(client.clone(), TEST_NAMESPACE)
        .create(&pp, &sample_workflow("it-wf2", &["it-b1", "it-ghost"]))
        .await
        .expect("failed to create workflow");
    Api::<Agent>::namespaced(client.clone(), TEST_NAMESPACE)
        .create(&pp, &sample_agent("it-b1"))
        .await
        .expect("failed to create agent");
    let runs: Api<WorkflowRun> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let run = runs
        .create(&pp, &sample_run("it-broken", "it-wf2", &["it-b1", "it-ghost"]))
        .await
        .expect("failed to create run");

    let ctx = Arc::new(Context::builder(client.clone()).build());
    let err = reconcile(Arc::new(run), ctx)
        .await
        .expect_err("reconcile should fail");
    assert!(err.is_not_found());

    let deployment = Api::<Deployment>::namespaced(client.clone(), TEST_NAMESPACE)
        .get_opt("it-broken")
        .await
        .expect("lookup failed");
    assert!(deployment.is_none());

    let stored = runs.get("it-broken").await.expect("run missing");
    let available = find_condition(stored.conditions(), "Available").expect("no condition");
    assert!(available.message.contains("it-ghost"));

    cleanup_all(&client, "it-broken", "it-wf2", &["it-b1"]).await;
}
