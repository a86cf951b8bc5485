//! Shared Kubernetes utilities using kube-rs
//!
//! Client construction and CRD installation used by both binaries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, CustomResourceExt, ResourceExt};
use tracing::{debug, info};

use crate::crd::Tenant;
use crate::retry::{retry_while, RetryConfig};
use crate::{Error, FIELD_MANAGER};

/// Default connection timeout for kube clients (5s is plenty for local API server)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Install the process-wide FIPS-validated crypto provider (aws-lc-rs)
///
/// Must run before the first client is created. Failing here means TLS cannot
/// be used at all.
pub fn install_crypto_provider() -> Result<(), Error> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|e| Error::config(format!("failed to install crypto provider: {:?}", e)))
}

/// `$HOME/.kube/config`, the conventional kubeconfig location
///
/// Returns `None` when the home directory cannot be determined.
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

/// Create a kube client from optional kubeconfig path with default timeouts
///
/// Without a path the configuration is inferred (in-cluster service account,
/// then `KUBECONFIG` / `~/.kube/config`).
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::config(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::config(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::config(format!("failed to infer config: {}", e)))?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| Error::config(format!("failed to create client: {}", e)))
}

/// Install or update the Tenant CRD using server-side apply
///
/// Retried with backoff so the operator survives an API server that is still
/// coming up.
pub async fn install_tenant_crd(client: &Client, retry: &RetryConfig) -> Result<(), Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let crd = Tenant::crd();
    let name = crd.name_any();
    let params = PatchParams::apply(FIELD_MANAGER).force();

    retry_while(
        retry,
        "install_tenant_crd",
        || {
            let crds = crds.clone();
            let crd = crd.clone();
            let name = name.clone();
            let params = params.clone();
            async move {
                crds.patch(&name, &params, &Patch::Apply(&crd))
                    .await
                    .map_err(Error::from)
            }
        },
        is_retryable_install_error,
    )
    .await?;

    info!(crd = %name, "CRD installed");
    Ok(())
}

/// Client-side rejections (bad request, forbidden, invalid) won't fix themselves
fn is_retryable_install_error(error: &Error) -> bool {
    match error {
        Error::Kube(kube::Error::Api(ae)) => !matches!(ae.code, 400 | 401 | 403 | 422),
        _ => true,
    }
}

/// Check if a CRD exists
pub async fn crd_exists(client: &Client, crd_name: &str) -> Result<bool, Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());

    match crds.get(crd_name).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            debug!(crd = %crd_name, "CRD not found");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
