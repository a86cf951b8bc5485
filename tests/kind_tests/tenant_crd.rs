//! Integration tests for Tenant CRD operations
//!
//! These tests tell the story of how users submit Tenant records, the same way
//! the `create-tenant` binary does.

use kube::api::{Api, PostParams};
use kube::ResourceExt;

use hoper::crd::{Tenant, TenantSpec};
use hoper::error::is_already_exists;
use hoper::tenant_client::{create_tenant, KubeTenantApi};
use hoper::Error;

use super::helpers::{cleanup_tenant, ensure_test_cluster, fresh_namespace};

/// Story: Platform operator creates a tenant
///
/// The Tenant is stored with both its object name and its spec name set to
/// the requested tenant name.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_creates_tenant() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-crd-create").await;
    let api = KubeTenantApi::new(client.clone());

    let created = create_tenant(&api, "acme", &ns)
        .await
        .expect("failed to create tenant");

    assert_eq!(created.name_any(), "acme");
    assert_eq!(created.spec.name, "acme");
    assert!(created.metadata.uid.is_some());

    let tenants: Api<Tenant> = Api::namespaced(client.clone(), &ns);
    let fetched = tenants.get("acme").await.expect("tenant should exist");
    assert_eq!(fetched.spec.name, "acme");

    cleanup_tenant(&client, &ns, "acme").await;
}

/// Story: Creating the same tenant twice fails the second time
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_duplicate_tenant_is_rejected() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-crd-duplicate").await;
    let api = KubeTenantApi::new(client.clone());

    create_tenant(&api, "acme", &ns)
        .await
        .expect("first create should succeed");

    match create_tenant(&api, "acme", &ns).await {
        Err(Error::Kube(e)) => assert!(is_already_exists(&e), "unexpected error: {e}"),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }

    cleanup_tenant(&client, &ns, "acme").await;
}

/// Story: The API server rejects a Tenant with an empty spec name
///
/// Even a client that skips local validation cannot store one.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_api_server_rejects_empty_spec_name() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = fresh_namespace(&client, "hoper-crd-empty").await;
    let tenants: Api<Tenant> = Api::namespaced(client.clone(), &ns);

    let tenant = Tenant::new("blank", TenantSpec::new(""));
    let err = tenants
        .create(&PostParams::default(), &tenant)
        .await
        .expect_err("empty spec name must be rejected");

    match err {
        kube::Error::Api(ae) => assert_eq!(ae.code, 422),
        other => panic!("expected validation failure, got {other:?}"),
    }
}
