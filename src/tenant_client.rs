//! Tenant creation client
//!
//! Submits new Tenant records. The API object's `metadata.name` and its
//! `spec.name` are both set to the requested tenant name.

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use tracing::{info, instrument};

#[cfg(test)]
use mockall::automock;

use crate::crd::{Tenant, TenantSpec};
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting Tenant writes for testability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantApi: Send + Sync {
    /// Create a Tenant in its own namespace, returning the stored object
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, Error>;
}

/// Real Kubernetes implementation of [`TenantApi`]
pub struct KubeTenantApi {
    client: Client,
}

impl KubeTenantApi {
    /// Create a new KubeTenantApi wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TenantApi for KubeTenantApi {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, Error> {
        let namespace = tenant
            .namespace()
            .ok_or_else(|| Error::validation("tenant has no namespace"))?;
        let api: Api<Tenant> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.create(&params, tenant).await?)
    }
}

/// Build the Tenant object submitted for `name`
pub fn build_tenant(name: &str, namespace: &str) -> Tenant {
    let mut tenant = Tenant::new(name, TenantSpec::new(name));
    tenant.metadata.namespace = Some(namespace.to_string());
    tenant
}

/// Create a Tenant named `name` in `namespace`
///
/// Rejects an empty name before any call is made. An existing Tenant with the
/// same name is reported as the API's `AlreadyExists` error, not overwritten.
#[instrument(skip(api))]
pub async fn create_tenant(
    api: &dyn TenantApi,
    name: &str,
    namespace: &str,
) -> Result<Tenant, Error> {
    if name.trim().is_empty() {
        return Err(Error::validation("tenant name must not be empty"));
    }

    let tenant = build_tenant(name, namespace);
    tenant.spec.validate()?;

    let created = api.create(&tenant).await?;
    info!(tenant = %created.name_any(), "tenant created");
    Ok(created)
}
