//! Hoper - CRD-driven Kubernetes operator for tenant workloads
//!
//! Hoper watches `Tenant` resources and makes sure every tenant has exactly one
//! managed echo Deployment running next to it.
//!
//! # Architecture
//!
//! - The operator registers the `Tenant` type into a process-wide [`scheme`]
//!   once at startup
//! - A `kube::runtime::Controller` watches Tenants (and the Deployments they own)
//!   and calls into the [`controller`] for every change
//! - The controller creates the child Deployment when it is missing and tags it
//!   with a controller owner reference; deletion is left to the Kubernetes
//!   garbage collector
//! - The `create-tenant` binary submits new Tenant records through
//!   [`tenant_client`]
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (Tenant)
//! - [`scheme`] - Type registry and owner reference assignment
//! - [`workload`] - Desired child Deployment construction
//! - [`controller`] - Tenant reconciliation logic
//! - [`tenant_client`] - Tenant creation client
//! - [`kube_utils`] - Kubernetes client helpers
//! - [`retry`] - Retry with exponential backoff
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod retry;
pub mod scheme;
pub mod tenant_client;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Override points: the operator takes `--echo-image` / `TENANT_ECHO_IMAGE`,
// and `create-tenant` takes `--namespace` / `TENANT_NAMESPACE`.

/// Default container image for the per-tenant echo Deployment
pub const DEFAULT_ECHO_IMAGE: &str = "hashicorp/http-echo";

/// Namespace `create-tenant` submits Tenants into unless told otherwise
pub const DEFAULT_TENANT_NAMESPACE: &str = "default";

/// Field manager name used for server-side apply and create calls
pub const FIELD_MANAGER: &str = "hoper-controller";

/// Label key carried by the echo Deployment's selector and pod template
pub const TENANT_LABEL_KEY: &str = "tenant";
