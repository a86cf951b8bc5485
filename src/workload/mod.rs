//! Desired workload construction for Tenants
//!
//! Builds the single-replica echo Deployment the controller keeps alive for
//! every Tenant. Everything here is pure; owner references are attached by the
//! controller through the [`crate::scheme`].

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::crd::deployment_name;
use crate::TENANT_LABEL_KEY;

/// Name of the single container in the echo pod
pub const ECHO_CONTAINER_NAME: &str = "echo";

/// Replica count of the echo Deployment
pub const ECHO_REPLICAS: i32 = 1;

/// Labels shared by the Deployment selector and its pod template
///
/// Both sides are built from this one map so they cannot drift apart.
pub fn tenant_labels(tenant_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(TENANT_LABEL_KEY.to_string(), tenant_name.to_string())])
}

/// Greeting the echo container serves
pub fn greeting(tenant_name: &str) -> String {
    format!("Hello from tenant: {}", tenant_name)
}

/// Build the echo Deployment for a tenant
///
/// The result has no owner references yet.
pub fn build_echo_deployment(tenant_name: &str, namespace: &str, image: &str) -> Deployment {
    let labels = tenant_labels(tenant_name);

    let container = Container {
        name: ECHO_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        args: Some(vec!["-text".to_string(), greeting(tenant_name)]),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name(tenant_name)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(ECHO_REPLICAS),
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
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Returns true if the Deployment's selector matches its pod template labels exactly
pub fn selector_matches_template(deployment: &Deployment) -> bool {
    let Some(spec) = deployment.spec.as_ref() else {
        return false;
    };
    let template_labels = spec
        .template
        .metadata
        .as_ref()
        .and_then(|m| m.labels.as_ref());

    spec.selector.match_expressions.is_none()
        && spec.selector.match_labels.is_some()
        && spec.selector.match_labels.as_ref() == template_labels
}
