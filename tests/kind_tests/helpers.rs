//! Shared setup for the kind integration tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::Client;
use tokio::sync::OnceCell;

use hoper::crd::Tenant;
use hoper::kube_utils::{create_client, crd_exists, install_crypto_provider, install_tenant_crd};
use hoper::retry::RetryConfig;
use hoper::scheme;

const TENANT_CRD_NAME: &str = "tenants.app.hoper.dev";

static CRD_READY: OnceCell<()> = OnceCell::const_new();

/// Connect to the test cluster and make sure the Tenant CRD is served
pub async fn ensure_test_cluster() -> Result<Client, String> {
    // Another test may have installed it already
    let _ = install_crypto_provider();
    scheme::init();

    let client = create_client(None)
        .await
        .map_err(|e| format!("failed to connect to cluster: {}", e))?;

    CRD_READY
        .get_or_try_init(|| async {
            install_tenant_crd(&client, &RetryConfig::startup())
                .await
                .map_err(|e| format!("failed to install CRD: {}", e))?;
            wait_for_crd(&client).await
        })
        .await?;

    Ok(client)
}

async fn wait_for_crd(client: &Client) -> Result<(), String> {
    for _ in 0..30 {
        if crd_exists(client, TENANT_CRD_NAME)
            .await
            .map_err(|e| e.to_string())?
        {
            // Give the API server a moment to start serving the new type
            tokio::time::sleep(Duration::from_secs(1)).await;
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Err(format!("CRD {} never became available", TENANT_CRD_NAME))
}

/// Create a fresh namespace for one test, deleting any leftover from a
/// previous run
pub async fn fresh_namespace(client: &Client, name: &str) -> String {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;

    // Namespace deletion is asynchronous; wait for it to finish
    for _ in 0..60 {
        match api.get_opt(name).await {
            Ok(None) => break,
            _ => tokio::time::sleep(Duration::from_secs(1)).await,
        }
    }

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    api.create(&PostParams::default(), &ns)
        .await
        .expect("failed to create namespace");
    name.to_string()
}

/// Delete a Tenant, ignoring errors
pub async fn cleanup_tenant(client: &Client, namespace: &str, name: &str) {
    let api: Api<Tenant> = Api::namespaced(client.clone(), namespace);
    let _ = api.delete(name, &DeleteParams::default()).await;
}
