//! Tenant controller implementation
//!
//! For every Tenant the controller makes sure one echo Deployment exists in the
//! Tenant's namespace, owned by the Tenant. The loop only ever creates: an
//! existing Deployment is left alone, and cleanup after a Tenant is deleted is
//! done by the Kubernetes garbage collector through the owner reference.
//!
//! Every step is safe to repeat or interleave with another reconcile of the
//! same Tenant: the existence check comes before the create, and a create that
//! loses a race (`AlreadyExists`) counts as success.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::Tenant;
use crate::error::{is_already_exists, is_not_found, ErrorClass};
use crate::scheme::Scheme;
use crate::workload::{build_echo_deployment, selector_matches_template};
use crate::{Error, DEFAULT_ECHO_IMAGE, FIELD_MANAGER};

/// Default upper bound on a single reconcile invocation
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Requeue delay after a transient failure
const TRANSIENT_REQUEUE: Duration = Duration::from_secs(5);

/// Requeue delay after a failure that retrying will not fix
const FATAL_REQUEUE: Duration = Duration::from_secs(300);

/// Trait abstracting Kubernetes client operations for the Tenant controller
///
/// Implementations return the API server's errors untouched; the reconciler
/// decides which of them are expected (`NotFound`, `AlreadyExists`).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch a Tenant
    async fn get_tenant(&self, namespace: &str, name: &str) -> Result<Tenant, Error>;

    /// Fetch a Deployment
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, Error>;

    /// Create a Deployment in its own namespace
    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_tenant(&self, namespace: &str, name: &str) -> Result<Tenant, Error> {
        let api: Api<Tenant> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        let namespace = deployment
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| Error::validation("deployment has no namespace"))?;

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.create(&params, deployment).await?;
        Ok(())
    }
}

/// Namespace and name of a Tenant to reconcile
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantRef {
    /// Namespace of the Tenant
    pub namespace: String,
    /// Name of the Tenant object
    pub name: String,
}

impl TenantRef {
    /// Create a reference from its parts
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Reference the given Tenant object
    pub fn from_tenant(tenant: &Tenant) -> Result<Self, Error> {
        let namespace = tenant.namespace().ok_or_else(|| {
            Error::validation(format!("tenant {} has no namespace", tenant.name_any()))
        })?;
        Ok(Self::new(namespace, tenant.name_any()))
    }
}

impl std::fmt::Display for TenantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cancellation signal and deadline for one reconcile invocation
///
/// Checked before every API call; a call in flight is abandoned as soon as
/// either fires. Nothing is retried inside the invocation.
#[derive(Clone, Debug)]
pub struct Invocation {
    cancel: CancellationToken,
    deadline: Instant,
}

impl Invocation {
    /// Create an invocation that ends after `timeout` or when `cancel` fires
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
        }
    }

    /// Fail if the invocation was cancelled or ran out of time
    pub fn check(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run one blocking call under this invocation's cancellation and deadline
    pub async fn run<T, F>(&self, call: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout_at(self.deadline, call) => {
                result.map_err(|_| Error::DeadlineExceeded)?
            }
        }
    }
}

/// Controller context containing shared state and clients
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .echo_image("registry.local/http-echo:1.0")
///     .build()?;
/// ```
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Type registry used to build owner references
    pub scheme: Arc<Scheme>,
    /// Image for the echo container
    pub echo_image: String,
    /// Upper bound on a single reconcile invocation
    pub reconcile_timeout: Duration,
    /// Cancelled when the operator shuts down
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Start a new invocation tied to this context's shutdown signal
    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.shutdown.child_token(), self.reconcile_timeout)
    }

    /// Create a context for testing with a mock client
    ///
    /// For production code, use [`Context::builder`].
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, scheme: Arc<Scheme>) -> Self {
        Self {
            kube,
            scheme,
            echo_image: DEFAULT_ECHO_IMAGE.to_string(),
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    scheme: Option<Arc<Scheme>>,
    echo_image: String,
    reconcile_timeout: Duration,
    shutdown: CancellationToken,
}

impl ContextBuilder {
    /// Create a new builder with the given Kubernetes client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            scheme: None,
            echo_image: DEFAULT_ECHO_IMAGE.to_string(),
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Use a specific scheme instead of the process-wide one
    pub fn scheme(mut self, scheme: Arc<Scheme>) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Set the echo container image
    pub fn echo_image(mut self, image: impl Into<String>) -> Self {
        self.echo_image = image.into();
        self
    }

    /// Set the per-invocation timeout
    pub fn reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = timeout;
        self
    }

    /// Set the shutdown token invocations derive from
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Build the Context
    ///
    /// Fails if no scheme was given and the process-wide scheme has not been
    /// initialized.
    pub fn build(self) -> Result<Context, Error> {
        let scheme = match self.scheme {
            Some(scheme) => scheme,
            None => Scheme::global()?,
        };

        Ok(Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone()))),
            scheme,
            echo_image: self.echo_image,
            reconcile_timeout: self.reconcile_timeout,
            shutdown: self.shutdown,
        })
    }
}

/// Reconcile a Tenant delivered by the watch pipeline
///
/// Re-reads the Tenant by reference so the decision is made on current API
/// state, not on the cached copy.
pub async fn reconcile(tenant: Arc<Tenant>, ctx: Arc<Context>) -> Result<Action, Error> {
    let tenant_ref = TenantRef::from_tenant(&tenant)?;
    reconcile_tenant(&tenant_ref, &ctx, &ctx.invocation()).await
}

/// Converge one Tenant toward its desired state
///
/// Returns `Action::await_change()` once the echo Deployment exists (or the
/// Tenant is gone), and an error for anything the caller should retry or
/// report.
#[instrument(skip(tenant_ref, ctx, inv), fields(tenant = %tenant_ref))]
pub async fn reconcile_tenant(
    tenant_ref: &TenantRef,
    ctx: &Context,
    inv: &Invocation,
) -> Result<Action, Error> {
    debug!("reconciling tenant");

    let tenant = match inv
        .run(ctx.kube.get_tenant(&tenant_ref.namespace, &tenant_ref.name))
        .await
    {
        Ok(tenant) => tenant,
        Err(Error::Kube(e)) if is_not_found(&e) => {
            // Owned children are removed by the garbage collector
            debug!("tenant no longer exists");
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = tenant.spec.validate() {
        warn!(error = %e, "tenant validation failed");
        // Don't requeue for validation errors - they require spec changes
        return Ok(Action::await_change());
    }

    let deployment_name = tenant.spec.deployment_name();

    match inv
        .run(ctx.kube.get_deployment(&tenant_ref.namespace, &deployment_name))
        .await
    {
        Ok(_) => {
            debug!(deployment = %deployment_name, "echo deployment already exists");
            return Ok(Action::await_change());
        }
        Err(Error::Kube(e)) if is_not_found(&e) => {}
        Err(e) => return Err(e),
    }

    let mut deployment =
        build_echo_deployment(&tenant.spec.name, &tenant_ref.namespace, &ctx.echo_image);
    debug_assert!(selector_matches_template(&deployment));

    ctx.scheme.set_controller_reference(&tenant, &mut deployment)?;

    match inv.run(ctx.kube.create_deployment(&deployment)).await {
        Ok(()) => {
            info!(deployment = %deployment_name, "created echo deployment");
        }
        Err(Error::Kube(e)) if is_already_exists(&e) => {
            debug!(deployment = %deployment_name, "echo deployment was created concurrently");
        }
        Err(e) => return Err(e),
    }

    Ok(Action::await_change())
}

/// Error policy for the Tenant controller
///
/// Transient failures are retried quickly. Fatal ones are retried on a long
/// interval so a fixed operator or spec is picked up without flooding the logs.
pub fn error_policy(tenant: Arc<Tenant>, error: &Error, _ctx: Arc<Context>) -> Action {
    let class = error.class();
    error!(
        ?error,
        error_class = %class,
        tenant = %tenant.name_any(),
        namespace = tenant.namespace().as_deref().unwrap_or_default(),
        "tenant reconciliation failed"
    );

    match class {
        ErrorClass::Transient => Action::requeue(TRANSIENT_REQUEUE),
        ErrorClass::Fatal => Action::requeue(FATAL_REQUEUE),
    }
}
