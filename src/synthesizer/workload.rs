//! Service and Deployment construction for the execution engine

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapEnvSource, ConfigMapVolumeSource, Container, ContainerPort, EnvFromSource, EnvVar,
    PodSpec, PodTemplateSpec, SecretEnvSource, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::WorkflowRunSpec;
use crate::{CONFIG_MOUNT_PATH, ENGINE_PORT, SERVICE_PORT};

/// Label selecting the pods of one run
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Name of the engine container port and of the bundle volume
const WORKFLOW_PORT_NAME: &str = "workflow";
const BUNDLE_VOLUME: &str = "workflow";

/// Environment variable carrying the run's log level
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Build the Service exposing the engine
///
/// Cluster-internal unless the run asks for a NodePort.
pub fn build_service(
    spec: &WorkflowRunSpec,
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    owner: OwnerReference,
) -> Service {
    let node_port = spec.node_port();
    let service_type = if node_port.is_some() {
        "NodePort"
    } else {
        "ClusterIP"
    };

    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(BTreeMap::from([(
                INSTANCE_LABEL.to_string(),
                name.to_string(),
            )])),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                protocol: Some("TCP".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(ENGINE_PORT)),
                node_port,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Whole-resource environment imports, environments first then secrets
pub fn env_from_sources(spec: &WorkflowRunSpec) -> Vec<EnvFromSource> {
    let mut sources = Vec::new();
    if let Some(name) = spec.environments_name() {
        sources.push(EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    if let Some(name) = spec.secrets_name() {
        sources.push(EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    sources
}

/// Build the single-replica Deployment running the engine
pub fn build_deployment(
    spec: &WorkflowRunSpec,
    name: &str,
    namespace: &str,
    image: &str,
    labels: BTreeMap<String, String>,
    owner: OwnerReference,
) -> Deployment {
    let env_from = env_from_sources(spec);
    let env = spec.log_level().map(|level| {
        vec![EnvVar {
            name: LOG_LEVEL_ENV.to_string(),
            value: Some(level.to_string()),
            ..Default::default()
        }]
    });

    let container = Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(WORKFLOW_PORT_NAME.to_string()),
            container_port: ENGINE_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: BUNDLE_VOLUME.to_string(),
            mount_path: CONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        env_from: (!env_from.is_empty()).then_some(env_from),
        env,
        ..Default::default()
    };

    let volume = Volume {
        name: BUNDLE_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: name.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![volume]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
