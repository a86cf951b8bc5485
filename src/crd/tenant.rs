//! Tenant Custom Resource Definition
//!
//! A Tenant is the desired-state record for one logical customer. The operator
//! derives a managed echo Deployment from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Suffix appended to the tenant name to form the managed Deployment name
pub const DEPLOYMENT_NAME_SUFFIX: &str = "-echo-deployment";

/// Maximum length of a label value, which bounds the tenant name
const MAX_TENANT_NAME_LEN: usize = 63;

/// Specification for a Tenant
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "app.hoper.dev",
    version = "v1alpha1",
    kind = "Tenant",
    plural = "tenants",
    status = "TenantStatus",
    namespaced,
    printcolumn = r#"{"name":"Tenant","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"InstanceCreated","type":"boolean","jsonPath":".status.instanceCreated"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    /// Logical tenant identifier
    ///
    /// Used to derive the managed Deployment name and its `tenant` label.
    #[schemars(length(min = 1, max = 63))]
    pub name: String,
}

impl TenantSpec {
    /// Create a spec for the given tenant name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name of the Deployment managed for this tenant
    ///
    /// Always the same for the same spec name, so repeated reconciles target the
    /// same child.
    pub fn deployment_name(&self) -> String {
        deployment_name(&self.name)
    }

    /// Validate the tenant specification
    ///
    /// The name ends up as a label value and as the prefix of a Deployment name,
    /// so it must be a DNS-1123 label.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let name = self.name.as_str();

        if name.trim().is_empty() {
            return Err(crate::Error::validation("tenant spec name must not be empty"));
        }

        if name.len() > MAX_TENANT_NAME_LEN {
            return Err(crate::Error::validation(format!(
                "tenant spec name '{}' is longer than {} characters",
                name, MAX_TENANT_NAME_LEN
            )));
        }

        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let valid_edges = name
            .chars()
            .next()
            .zip(name.chars().last())
            .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
            .unwrap_or(false);

        if !valid_chars || !valid_edges {
            return Err(crate::Error::validation(format!(
                "tenant spec name '{}' must consist of lowercase alphanumeric characters or '-', \
                 and must start and end with an alphanumeric character",
                name
            )));
        }

        Ok(())
    }
}

/// Derive the managed Deployment name for a tenant spec name
pub fn deployment_name(tenant_name: &str) -> String {
    format!("{}{}", tenant_name, DEPLOYMENT_NAME_SUFFIX)
}

/// Status for a Tenant
///
/// Reserved for future status reporting; the controller neither reads nor
/// writes these fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantStatus {
    /// Whether the tenant's instance has been created
    #[serde(default)]
    pub instance_created: bool,

    /// Observed conditions in chronological order
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
