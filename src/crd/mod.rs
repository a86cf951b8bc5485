//! Custom Resource Definitions for Hoper
//!
//! This module contains all CRD definitions used by the Hoper operator.

mod tenant;
mod types;

pub use tenant::{deployment_name, Tenant, TenantSpec, TenantStatus, DEPLOYMENT_NAME_SUFFIX};
pub use types::{Condition, ConditionStatus};
