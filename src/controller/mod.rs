//! Controller implementations for Hoper CRDs
//!
//! This module contains the reconciliation logic for the Tenant custom resource.
//! The controller follows the Kubernetes observe-then-act pattern: it looks at
//! what exists and creates whatever is missing.

mod tenant;

pub use tenant::{
    error_policy, reconcile, reconcile_tenant, Context, ContextBuilder, Invocation, KubeClient,
    KubeClientImpl, TenantRef, DEFAULT_RECONCILE_TIMEOUT,
};
