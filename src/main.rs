//! Hoper Operator - provisions an echo workload for every Tenant

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hoper::controller::{error_policy, reconcile, Context};
use hoper::crd::Tenant;
use hoper::kube_utils::{create_client, install_crypto_provider, install_tenant_crd};
use hoper::retry::RetryConfig;
use hoper::{scheme, DEFAULT_ECHO_IMAGE};

/// Hoper - CRD-driven Kubernetes operator for tenant workloads
#[derive(Parser, Debug)]
#[command(name = "hoper", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Installs the Tenant CRD, then watches Tenants and the Deployments they
    /// own until SIGINT/SIGTERM.
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug)]
struct ControllerArgs {
    /// Path to kubeconfig file (default: in-cluster config, then $KUBECONFIG or ~/.kube/config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Container image for the per-tenant echo Deployment
    #[arg(long, env = "TENANT_ECHO_IMAGE", default_value = DEFAULT_ECHO_IMAGE)]
    echo_image: String,

    /// Upper bound for a single reconcile, in seconds
    #[arg(long, default_value = "30")]
    reconcile_timeout_secs: u64,

    /// Only watch Tenants in this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Skip installing the Tenant CRD on startup
    #[arg(long)]
    skip_crd_install: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = install_crypto_provider() {
        eprintln!("CRITICAL: {e}. The operator cannot talk to the API server without TLS.");
        std::process::exit(1);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let crd = serde_yaml::to_string(&Tenant::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    match cli.command {
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => run_controller(ControllerArgs::parse_from(["controller"])).await,
    }
}

/// Run the Tenant controller until shutdown
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("Hoper controller starting...");

    // Types must be registered before anything watches or reconciles
    let scheme = scheme::init();

    let client = create_client(args.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.skip_crd_install {
        tracing::info!("Skipping CRD install");
    } else {
        install_tenant_crd(&client, &RetryConfig::startup())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install Tenant CRD: {}", e))?;
    }

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(
        Context::builder(client.clone())
            .scheme(scheme)
            .echo_image(args.echo_image.clone())
            .reconcile_timeout(Duration::from_secs(args.reconcile_timeout_secs))
            .shutdown(shutdown.clone())
            .build()?,
    );

    let (tenants, deployments): (Api<Tenant>, Api<Deployment>) = match args.namespace.as_deref() {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    tracing::info!(
        namespace = args.namespace.as_deref().unwrap_or("<all>"),
        echo_image = %args.echo_image,
        reconcile_timeout_secs = args.reconcile_timeout_secs,
        "Starting Tenant controller"
    );

    // Cancel in-flight reconciles once the controller starts shutting down
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    Controller::new(tenants, WatcherConfig::default().timeout(25))
        .owns(deployments, WatcherConfig::default().timeout(25))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((tenant, action)) => {
                    tracing::debug!(tenant = %tenant, ?action, "Tenant reconciliation completed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Tenant reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Hoper controller shutting down");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
