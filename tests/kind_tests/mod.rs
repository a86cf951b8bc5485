//! Integration tests for the Hoper operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how platform operators interact with Hoper in real-world scenarios.
//!
//! # Test Organization
//!
//! - `tenant_crd`: Stories about submitting Tenant records the way
//!   `create-tenant` does
//!
//! - `tenant_lifecycle`: Stories about how the controller turns a Tenant into
//!   an owned echo Deployment
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```
//!
//! The current kubeconfig context is used; the Tenant CRD is installed on
//! first use.

mod helpers;
mod tenant_crd;
mod tenant_lifecycle;
