//! Integration tests for Tenant reconciliation
//!
//! These tests tell the story of how the controller turns a Tenant into a
//! running echo Deployment. They call the reconciler directly against a real
//! API server, the way the controller runtime would.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};

use hoper::controller::{reconcile, reconcile_tenant, Context, TenantRef};
use hoper::crd::Tenant;
use hoper::scheme;
use hoper::tenant_client::build_tenant;

use super::helpers::{cleanup_tenant, ensure_test_cluster, fresh_namespace};

// =============================================================================
// Test Fixtures
// =============================================================================

fn create_test_context(client: Client) -> Arc<Context> {
    Arc::new(
        Context::builder(client)
            .scheme(scheme::init())
            .build()
            .expect("failed to build context"),
    )
}

async fn submit_tenant(client: &Client, namespace: &str, name: &str) -> Tenant {
    let api: Api<Tenant> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), &build_tenant(name, namespace))
        .await
        .expect("failed to create tenant")
}

// =============================================================================
// Provisioning Stories
// =============================================================================

/// Story: A new Tenant gets an echo Deployment it owns
///
/// Lifecycle: Tenant created -> reconcile -> `<name>-echo-deployment` exists
/// with the Tenant as controlling owner.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_tenant_gets_owned_echo_deployment() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-lifecycle-create").await;
    let ctx = create_test_context(client.clone());

    let tenant = submit_tenant(&client, &ns, "acme").await;

    let action = reconcile(Arc::new(tenant.clone()), ctx)
        .await
        .expect("reconcile should succeed");
    assert_eq!(action, Action::await_change());

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &ns);
    let deployment = deployments
        .get("acme-echo-deployment")
        .await
        .expect("echo deployment should exist");

    let owners = deployment.owner_references();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].kind, "Tenant");
    assert_eq!(Some(&owners[0].uid), tenant.metadata.uid.as_ref());
    assert_eq!(owners[0].controller, Some(true));

    cleanup_tenant(&client, &ns, "acme").await;
}

/// Story: Reconciling over and over never creates a second Deployment
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_repeated_reconciles_are_idempotent() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-lifecycle-idempotent").await;
    let ctx = create_test_context(client.clone());

    submit_tenant(&client, &ns, "acme").await;
    let tenant_ref = TenantRef::new(&ns, "acme");

    for _ in 0..3 {
        reconcile_tenant(&tenant_ref, &ctx, &ctx.invocation())
            .await
            .expect("reconcile should succeed");
    }

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &ns);
    let list = deployments
        .list(&Default::default())
        .await
        .expect("failed to list deployments");
    assert_eq!(list.items.len(), 1);

    cleanup_tenant(&client, &ns, "acme").await;
}

/// Story: A Tenant deleted before its reconcile runs is simply skipped
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_deleted_tenant_is_skipped() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-lifecycle-deleted").await;
    let ctx = create_test_context(client.clone());

    let tenant_ref = TenantRef::new(&ns, "never-existed");
    let action = reconcile_tenant(&tenant_ref, &ctx, &ctx.invocation())
        .await
        .expect("missing tenant is not an error");
    assert_eq!(action, Action::await_change());

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &ns);
    let list = deployments
        .list(&Default::default())
        .await
        .expect("failed to list deployments");
    assert!(list.items.is_empty());
}

/// Story: Deleting a Tenant lets the garbage collector remove its Deployment
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_deleting_tenant_collects_deployment() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-lifecycle-gc").await;
    let ctx = create_test_context(client.clone());

    let tenant = submit_tenant(&client, &ns, "acme").await;
    reconcile(Arc::new(tenant), ctx)
        .await
        .expect("reconcile should succeed");

    let tenants: Api<Tenant> = Api::namespaced(client.clone(), &ns);
    tenants
        .delete("acme", &DeleteParams::foreground())
        .await
        .expect("failed to delete tenant");

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &ns);
    let mut collected = false;
    for _ in 0..60 {
        if deployments
            .get_opt("acme-echo-deployment")
            .await
            .expect("failed to get deployment")
            .is_none()
        {
            collected = true;
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert!(collected, "echo deployment should be garbage collected");
}
