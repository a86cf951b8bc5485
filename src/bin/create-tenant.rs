//! create-tenant - submit a new Tenant to the cluster
//!
//! ```text
//! create-tenant --tenant-name acme [--kubeconfig PATH] [--namespace NS]
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hoper::kube_utils::{create_client, default_kubeconfig_path, install_crypto_provider};
use hoper::tenant_client::{create_tenant, KubeTenantApi};
use hoper::DEFAULT_TENANT_NAMESPACE;

/// Create a Tenant custom resource
#[derive(Parser, Debug)]
#[command(name = "create-tenant", version, about, long_about = None)]
struct Args {
    /// Path to kubeconfig file (default: $HOME/.kube/config)
    ///
    /// Without a path the client config is inferred, which also honours a
    /// `KUBECONFIG` list.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Name of the tenant to create
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    tenant_name: String,

    /// Namespace to create the Tenant in
    #[arg(long, env = "TENANT_NAMESPACE", default_value = DEFAULT_TENANT_NAMESPACE)]
    namespace: String,
}

/// Kubeconfig to load: the flag, else the home default, else none (inferred)
fn resolve_kubeconfig(explicit: Option<PathBuf>, home_default: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .filter(|path| !path.as_os_str().is_empty())
        .or(home_default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Usage errors exit with status 2 before anything touches the network
    let args = Args::parse();

    install_crypto_provider()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let kubeconfig = resolve_kubeconfig(args.kubeconfig.clone(), default_kubeconfig_path());
    println!(
        "Using kubeconfig: {}",
        kubeconfig.as_deref().map(|p| p.display().to_string()).unwrap_or_default()
    );

    let client = create_client(kubeconfig.as_deref())
        .await
        .context("failed to build Kubernetes client")?;
    let api = KubeTenantApi::new(client);

    create_tenant(&api, &args.tenant_name, &args.namespace)
        .await
        .with_context(|| format!("failed to create tenant {}", args.tenant_name))?;

    println!("Tenant CR created!");
    Ok(())
}
